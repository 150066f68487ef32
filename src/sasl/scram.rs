//! Server-side SCRAM-SHA-1/256 (RFC 5802), invoked via `saslStart`/
//! `saslContinue`.
//!
//! This runs the protocol from the *server* side: we generate the salt and
//! server nonce, and verify the client's proof instead of computing one.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{CredentialStore, Mechanism, MechanismStep, SaslError, SaslResult};

const ITERATIONS: u32 = 4096;
const SERVER_NONCE_LEN: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScramVariant {
    Sha1,
    Sha256,
}

impl ScramVariant {
    fn hash_len(self) -> usize {
        match self {
            ScramVariant::Sha1 => 20,
            ScramVariant::Sha256 => 32,
        }
    }

    /// The password material fed into PBKDF2: MongoDB's MD5 digest for
    /// SCRAM-SHA-1, the plain password for SCRAM-SHA-256.
    fn password_digest(self, username: &str, password: &str) -> Vec<u8> {
        match self {
            ScramVariant::Sha1 => {
                let input = format!("{username}:mongo:{password}");
                format!("{:x}", md5::compute(input.as_bytes())).into_bytes()
            }
            ScramVariant::Sha256 => password.as_bytes().to_vec(),
        }
    }

    fn pbkdf2(self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut out = vec![0u8; self.hash_len()];
        match self {
            ScramVariant::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out),
            ScramVariant::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
        }
        out
    }

    fn hmac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            ScramVariant::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            ScramVariant::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }

    fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            ScramVariant::Sha1 => {
                let mut h = Sha1::new();
                h.update(data);
                h.finalize().to_vec()
            }
            ScramVariant::Sha256 => {
                let mut h = Sha256::new();
                h.update(data);
                h.finalize().to_vec()
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScramVariant::Sha1 => "SCRAM-SHA-1",
            ScramVariant::Sha256 => "SCRAM-SHA-256",
        }
    }
}

enum Step {
    AwaitClientFirst,
    AwaitClientFinal {
        salted_password: Vec<u8>,
        auth_message: String,
        server_nonce: String,
    },
    Done,
}

pub struct ScramMechanism {
    variant: ScramVariant,
    db: String,
    credentials: Arc<dyn CredentialStore>,
    step: Step,
}

impl ScramMechanism {
    pub fn new(variant: ScramVariant, db: String, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            variant,
            db,
            credentials,
            step: Step::AwaitClientFirst,
        }
    }

    fn handle_client_first(&mut self, payload: &[u8]) -> SaslResult<MechanismStep> {
        let msg = std::str::from_utf8(payload)
            .map_err(|_| SaslError::Unexpected("client-first-message is not valid UTF-8".to_string()))?;
        // gs2-header (e.g. "n,,") then the bare message; channel binding is
        // not supported, so the header is always exactly two empty-ish
        // comma-separated fields.
        let bare = msg
            .splitn(3, ',')
            .nth(2)
            .ok_or_else(|| SaslError::Unexpected("malformed client-first-message".to_string()))?;

        let mut username = None;
        let mut client_nonce = None;
        for field in bare.split(',') {
            if let Some(rest) = field.strip_prefix("n=") {
                username = Some(unescape_scram_username(rest));
            } else if let Some(rest) = field.strip_prefix("r=") {
                client_nonce = Some(rest.to_string());
            }
        }
        let username = username
            .ok_or_else(|| SaslError::Unexpected("client-first-message missing n=".to_string()))?;
        let client_nonce = client_nonce
            .ok_or_else(|| SaslError::Unexpected("client-first-message missing r=".to_string()))?;

        let password = self
            .credentials
            .password(&self.db, &username)
            .ok_or_else(|| SaslError::Standard(format!("no credentials for user {username}")))?;
        let password_digest = self.variant.password_digest(&username, &password);

        let mut salt = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let server_nonce = format!("{client_nonce}{}", generate_nonce());

        let client_first_bare = bare.to_string();
        let server_first = format!(
            "r={server_nonce},s={},i={ITERATIONS}",
            BASE64.encode(&salt)
        );
        let client_final_without_proof = format!("c=biws,r={server_nonce}");
        let auth_message = format!("{client_first_bare},{server_first},{client_final_without_proof}");

        let salted_password = self.variant.pbkdf2(&password_digest, &salt, ITERATIONS);

        self.step = Step::AwaitClientFinal {
            salted_password,
            auth_message,
            server_nonce,
        };

        Ok(MechanismStep {
            message: server_first.into_bytes(),
            done: false,
        })
    }

    fn handle_client_final(
        &mut self,
        payload: &[u8],
        salted_password: Vec<u8>,
        auth_message: String,
        server_nonce: String,
    ) -> SaslResult<MechanismStep> {
        let msg = std::str::from_utf8(payload)
            .map_err(|_| SaslError::Unexpected("client-final-message is not valid UTF-8".to_string()))?;

        let mut nonce = None;
        let mut proof = None;
        for field in msg.split(',') {
            if let Some(rest) = field.strip_prefix("r=") {
                nonce = Some(rest.to_string());
            } else if let Some(rest) = field.strip_prefix("p=") {
                proof = Some(rest.to_string());
            }
        }
        let nonce =
            nonce.ok_or_else(|| SaslError::Unexpected("client-final-message missing r=".to_string()))?;
        if nonce != server_nonce {
            return Err(SaslError::Standard("nonce mismatch in client-final-message".to_string()));
        }
        let proof_b64 =
            proof.ok_or_else(|| SaslError::Unexpected("client-final-message missing p=".to_string()))?;
        let client_proof = BASE64
            .decode(proof_b64)
            .map_err(|_| SaslError::Unexpected("invalid base64 client proof".to_string()))?;

        let client_key = self.variant.hmac(&salted_password, b"Client Key");
        let stored_key = self.variant.hash(&client_key);
        let client_signature = self.variant.hmac(&stored_key, auth_message.as_bytes());
        let expected_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        if expected_proof != client_proof {
            return Err(SaslError::Standard("SCRAM client proof does not match".to_string()));
        }

        let server_key = self.variant.hmac(&salted_password, b"Server Key");
        let server_signature = self.variant.hmac(&server_key, auth_message.as_bytes());
        let server_final = format!("v={}", BASE64.encode(&server_signature));

        self.step = Step::Done;
        Ok(MechanismStep {
            message: server_final.into_bytes(),
            done: true,
        })
    }
}

impl Mechanism for ScramMechanism {
    fn step(&mut self, payload: &[u8]) -> SaslResult<MechanismStep> {
        match std::mem::replace(&mut self.step, Step::Done) {
            Step::AwaitClientFirst => self.handle_client_first(payload),
            Step::AwaitClientFinal {
                salted_password,
                auth_message,
                server_nonce,
            } => self.handle_client_final(payload, salted_password, auth_message, server_nonce),
            Step::Done => Err(SaslError::Unexpected("SCRAM conversation already completed".to_string())),
        }
    }
}

fn generate_nonce() -> String {
    let mut bytes = vec![0u8; SERVER_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(&bytes)
}

/// Reverses the `=2C`/`=3D` escaping SCRAM usernames use for literal commas
/// and equals signs (RFC 5802 §5.1).
fn unescape_scram_username(s: &str) -> String {
    s.replace("=2C", ",").replace("=3D", "=")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPassword(&'static str);
    impl CredentialStore for FixedPassword {
        fn password(&self, _db: &str, _user: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn full_exchange(variant: ScramVariant) {
        let creds = Arc::new(FixedPassword("s3kr1t"));
        let mut server = ScramMechanism::new(variant, "admin".to_string(), creds);

        let client_first = b"n,,n=pat,r=clientnonce123";
        let first_step = server.step(client_first).unwrap();
        assert!(!first_step.done);
        let server_first = std::str::from_utf8(&first_step.message).unwrap().to_string();

        let mut server_nonce = None;
        let mut salt_b64 = None;
        let mut iterations = None;
        for field in server_first.split(',') {
            if let Some(rest) = field.strip_prefix("r=") {
                server_nonce = Some(rest.to_string());
            } else if let Some(rest) = field.strip_prefix("s=") {
                salt_b64 = Some(rest.to_string());
            } else if let Some(rest) = field.strip_prefix("i=") {
                iterations = Some(rest.parse::<u32>().unwrap());
            }
        }
        let server_nonce = server_nonce.unwrap();
        let salt = BASE64.decode(salt_b64.unwrap()).unwrap();
        let iterations = iterations.unwrap();

        let password_digest = variant.password_digest("pat", "s3kr1t");
        let salted_password = variant.pbkdf2(&password_digest, &salt, iterations);
        let client_first_bare = "n=pat,r=clientnonce123";
        let client_final_without_proof = format!("c=biws,r={server_nonce}");
        let auth_message =
            format!("{client_first_bare},{server_first},{client_final_without_proof}");

        let client_key = variant.hmac(&salted_password, b"Client Key");
        let stored_key = variant.hash(&client_key);
        let client_signature = variant.hmac(&stored_key, auth_message.as_bytes());
        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        let client_final =
            format!("{client_final_without_proof},p={}", BASE64.encode(&client_proof));

        let final_step = server.step(client_final.as_bytes()).unwrap();
        assert!(final_step.done);
        let server_final = std::str::from_utf8(&final_step.message).unwrap();
        assert!(server_final.starts_with("v="));
    }

    #[test]
    fn completes_sha256_exchange() {
        full_exchange(ScramVariant::Sha256);
    }

    #[test]
    fn completes_sha1_exchange() {
        full_exchange(ScramVariant::Sha1);
    }

    #[test]
    fn rejects_forged_client_proof() {
        let creds = Arc::new(FixedPassword("s3kr1t"));
        let mut server = ScramMechanism::new(ScramVariant::Sha256, "admin".to_string(), creds);
        server.step(b"n,,n=pat,r=clientnonce123").unwrap();
        let forged = "c=biws,r=clientnonce123bogus,p=AAAA";
        assert!(server.step(forged.as_bytes()).is_err());
    }
}
