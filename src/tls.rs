//! Server-side TLS acceptor, built from [`Config`]'s `tls_*` fields.
//!
//! Builds a `ServerConfig` that terminates inbound client connections,
//! with the usual rustls cert/key-loading idiom (PEM files, optional
//! client-cert CA for mutual TLS).

use std::fs;
use std::io::BufReader;
use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::Config;
use crate::error::{Error, Result};

/// Builds a [`TlsAcceptor`] from `cfg`'s cert/key (and, when
/// `tls_client_auth` is set, CA file for verifying client certificates).
/// Returns `Ok(None)` when no TLS material is configured — the caller then
/// accepts plain TCP.
pub fn build_tls_acceptor(cfg: &Config) -> Result<Option<TlsAcceptor>> {
    let (cert_file, key_file) = match (&cfg.tls_cert_file, &cfg.tls_key_file) {
        (Some(c), Some(k)) => (c, k),
        _ => return Ok(None),
    };

    let cert_data = fs::read(cert_file).map_err(|e| Error::Config(format!("failed to read {cert_file}: {e}")))?;
    let key_data = fs::read(key_file).map_err(|e| Error::Config(format!("failed to read {key_file}: {e}")))?;

    let mut cert_reader = BufReader::new(&cert_data[..]);
    let cert_chain = certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("failed to parse {cert_file}: {e}")))?;

    let mut key_reader = BufReader::new(&key_data[..]);
    let mut keys = pkcs8_private_keys(&mut key_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("failed to parse {key_file}: {e}")))?;
    let key = keys
        .pop()
        .ok_or_else(|| Error::Config(format!("no private key found in {key_file}")))?;
    let key = rustls::pki_types::PrivateKeyDer::try_from(key)
        .map_err(|e| Error::Config(format!("invalid private key in {key_file}: {e}")))?;

    let builder = ServerConfig::builder();
    let server_config = if cfg.tls_client_auth {
        let ca_file = cfg
            .tls_ca_file
            .as_ref()
            .ok_or_else(|| Error::Config("tls_client_auth requires tls_ca_file".to_string()))?;
        let ca_data = fs::read(ca_file).map_err(|e| Error::Config(format!("failed to read {ca_file}: {e}")))?;
        let mut ca_reader = BufReader::new(&ca_data[..]);
        let mut roots = RootCertStore::empty();
        for cert in certs(&mut ca_reader) {
            let cert = cert.map_err(|e| Error::Config(format!("failed to parse {ca_file}: {e}")))?;
            roots.add(cert).map_err(|e| Error::Config(format!("failed to add CA cert: {e}")))?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| Error::Config(format!("failed to build client verifier: {e}")))?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, key)
            .map_err(|e| Error::Config(format!("failed to configure server cert: {e}")))?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)
            .map_err(|e| Error::Config(format!("failed to configure server cert: {e}")))?
    };

    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}

/// Drives the server-side handshake on a freshly accepted socket, returning
/// the peer's certificate common name when client auth is configured and the
/// client presented a certificate.
pub async fn accept(acceptor: &TlsAcceptor, socket: TcpStream) -> Result<(TlsStream<TcpStream>, Option<String>)> {
    let stream = acceptor
        .accept(socket)
        .await
        .map_err(|e| Error::Framing(format!("TLS handshake failed: {e}")))?;
    let peer_cn = peer_common_name(&stream);
    Ok((stream, peer_cn))
}

fn peer_common_name(stream: &TlsStream<TcpStream>) -> Option<String> {
    let (_, session) = stream.get_ref();
    let certs = session.peer_certificates()?;
    let leaf = certs.first()?;
    // A full X.509 DN parse is out of scope; common names in the issued
    // certs this server expects appear as a "CN=..." substring in the DER,
    // which is good enough to surface for embedder-side ACL checks.
    extract_cn(leaf.as_ref())
}

fn extract_cn(der: &[u8]) -> Option<String> {
    let marker = b"CN=";
    let pos = der.windows(marker.len()).position(|w| w == marker)?;
    let rest = &der[pos + marker.len()..];
    let end = rest.iter().position(|&b| b == 0 || b < 0x20).unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).ok().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tls_material_returns_none() {
        let cfg = Config::default();
        let acceptor = build_tls_acceptor(&cfg).unwrap();
        assert!(acceptor.is_none());
    }

    #[test]
    fn missing_cert_file_is_an_error() {
        let mut cfg = Config::default();
        cfg.tls_cert_file = Some("/nonexistent/cert.pem".to_string());
        cfg.tls_key_file = Some("/nonexistent/key.pem".to_string());
        assert!(build_tls_acceptor(&cfg).is_err());
    }
}
