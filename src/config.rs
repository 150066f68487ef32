//! Server configuration: TOML file + CLI/env overrides, plus the capability
//! knobs `hello`/`isMaster` and `buildInfo` report to drivers.

use std::fs;

use serde::Deserialize;

use crate::bson::{Document, DocumentBuilder};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: Option<String>,

    // TLS
    #[serde(default)]
    pub tls_cert_file: Option<String>,
    #[serde(default)]
    pub tls_key_file: Option<String>,
    #[serde(default)]
    pub tls_ca_file: Option<String>,
    #[serde(default)]
    pub tls_client_auth: bool,

    // isMaster/hello + buildInfo capability knobs.
    #[serde(default = "default_max_bson_object_size")]
    pub max_bson_object_size: i32,
    #[serde(default = "default_max_message_size_bytes")]
    pub max_message_size_bytes: i32,
    #[serde(default = "default_max_write_batch_size")]
    pub max_write_batch_size: i32,
    #[serde(default = "default_logical_session_timeout_minutes")]
    pub logical_session_timeout_minutes: i32,
    #[serde(default = "default_min_wire_version")]
    pub min_wire_version: i32,
    #[serde(default = "default_max_wire_version")]
    pub max_wire_version: i32,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub compressions: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub authorization_enabled: bool,
}

fn default_max_bson_object_size() -> i32 {
    16 * 1024 * 1024
}
fn default_max_message_size_bytes() -> i32 {
    48_000_000
}
fn default_max_write_batch_size() -> i32 {
    100_000
}
fn default_logical_session_timeout_minutes() -> i32 {
    30
}
fn default_min_wire_version() -> i32 {
    0
}
fn default_max_wire_version() -> i32 {
    7
}
fn default_version() -> String {
    "3.4.22".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:27017".to_string(),
            log_level: None,
            tls_cert_file: None,
            tls_key_file: None,
            tls_ca_file: None,
            tls_client_auth: false,
            max_bson_object_size: default_max_bson_object_size(),
            max_message_size_bytes: default_max_message_size_bytes(),
            max_write_batch_size: default_max_write_batch_size(),
            logical_session_timeout_minutes: default_logical_session_timeout_minutes(),
            min_wire_version: default_min_wire_version(),
            max_wire_version: default_max_wire_version(),
            read_only: false,
            compressions: Vec::new(),
            version: default_version(),
            authorization_enabled: false,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file. If `path_opt` is `None` or the
    /// file is missing/unreadable, returns defaults. Parsing errors surface.
    pub fn load_from_file(path_opt: Option<&str>) -> Result<Self> {
        let path = path_opt.unwrap_or("config.toml");
        match fs::read_to_string(path) {
            Ok(contents) => {
                toml::from_str::<Config>(&contents).map_err(|e| Error::Config(format!("failed to parse {path}: {e}")))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Applies CLI/env overrides (highest precedence) to an existing config.
    pub fn with_overrides(mut self, listen_addr: Option<String>, log_level: Option<String>) -> Self {
        if let Some(addr) = listen_addr {
            self.listen_addr = addr;
        }
        if let Some(ll) = log_level {
            self.log_level = Some(ll);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::Config("listen_addr cannot be empty".to_string()));
        }
        if !self.listen_addr.contains(':') {
            return Err(Error::Config(format!(
                "listen_addr '{}' must be in host:port format",
                self.listen_addr
            )));
        }
        if self.min_wire_version > self.max_wire_version {
            return Err(Error::Config(format!(
                "min_wire_version ({}) cannot exceed max_wire_version ({})",
                self.min_wire_version, self.max_wire_version
            )));
        }

        if self.tls_cert_file.is_some() || self.tls_key_file.is_some() {
            if self.tls_cert_file.is_none() {
                return Err(Error::Config("tls_cert_file must be set when tls_key_file is set".to_string()));
            }
            if self.tls_key_file.is_none() {
                return Err(Error::Config("tls_key_file must be set when tls_cert_file is set".to_string()));
            }
            for (label, file) in [("tls_cert_file", &self.tls_cert_file), ("tls_key_file", &self.tls_key_file)] {
                if let Some(path) = file {
                    if !std::path::Path::new(path).exists() {
                        return Err(Error::Config(format!("{label} '{path}' does not exist")));
                    }
                }
            }
            if let Some(ref ca) = self.tls_ca_file {
                if !std::path::Path::new(ca).exists() {
                    return Err(Error::Config(format!("tls_ca_file '{ca}' does not exist")));
                }
            }
        }

        Ok(())
    }

    /// Splits `version` on `.` into a `versionArray` of ints.
    fn version_array(&self) -> Vec<i32> {
        self.version.split('.').filter_map(|p| p.parse().ok()).collect()
    }

    /// A fresh `hello`/`isMaster` reply document: current
    /// Config plus `localTime`, and, when the client asked for
    /// `saslSupportedMechs`, the compiled-in mechanism list.
    pub fn hello_document(&self, sasl_supported_mechs_requested: Option<&str>) -> Document {
        let mut b = DocumentBuilder::new();
        b.append_bool("ismaster", !self.read_only)
            .append_bool("readOnly", self.read_only)
            .append_i32("maxBsonObjectSize", self.max_bson_object_size)
            .append_i32("maxMessageSizeBytes", self.max_message_size_bytes)
            .append_i32("maxWriteBatchSize", self.max_write_batch_size)
            .append_datetime_millis("localTime", now_millis())
            .append_i32("logicalSessionTimeoutMinutes", self.logical_session_timeout_minutes)
            .append_i32("minWireVersion", self.min_wire_version)
            .append_i32("maxWireVersion", self.max_wire_version);

        if sasl_supported_mechs_requested.is_some() {
            let mechs: Vec<crate::bson::Value> =
                crate::sasl::SUPPORTED_MECHANISMS.iter().map(|m| crate::bson::Value::from(*m)).collect();
            b.append_array("saslSupportedMechs", mechs);
        }

        b.append_f64("ok", 1.0);
        b.build()
    }

    /// A fresh `buildInfo` reply document.
    pub fn build_info_document(&self) -> Document {
        let version_array: Vec<crate::bson::Value> =
            self.version_array().into_iter().map(crate::bson::Value::from).collect();
        let mut b = DocumentBuilder::new();
        b.append_str("version", self.version.clone())
            .append_array("versionArray", version_array)
            .append_array(
                "compression",
                self.compressions.iter().map(|c| crate::bson::Value::from(c.as_str())).collect(),
            )
            .append_i32("maxBsonObjectSize", self.max_bson_object_size)
            .append_f64("ok", 1.0);
        b.build()
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
