//! SASL conversation state machine: a connection-scoped
//! mechanism context keyed by a server-assigned conversation id.
//!
//! Models the no-context → started → stepping → done progression as an
//! explicit Rust state machine rather than a trait-object swap.

pub mod scram;

use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::Error;

/// One step's output: the bytes to send back to the client, and whether the
/// conversation is finished.
pub struct MechanismStep {
    pub message: Vec<u8>,
    pub done: bool,
}

/// A mechanism-level SASL failure, split into the two buckets the wire
/// protocol treats differently.
#[derive(Debug, Clone)]
pub enum SaslError {
    /// An advertised protocol failure — wrong password, proof mismatch,
    /// unknown user, nonce mismatch. Every driver already knows how to fail
    /// a conversation out of this, so it is reported as a structured SASL
    /// step reply (`done: false`, `ok: 1.0`) rather than a command failure.
    Standard(String),
    /// Malformed input or a conversation used after it already completed —
    /// not part of the advertised protocol vocabulary. Reported as an
    /// ordinary command failure (`ok: 0.0`).
    Unexpected(String),
}

impl std::fmt::Display for SaslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaslError::Standard(m) | SaslError::Unexpected(m) => write!(f, "{m}"),
        }
    }
}

impl From<SaslError> for Error {
    fn from(e: SaslError) -> Self {
        match e {
            SaslError::Standard(m) | SaslError::Unexpected(m) => Error::Auth(m),
        }
    }
}

pub type SaslResult<T> = std::result::Result<T, SaslError>;

/// A single SASL mechanism's per-conversation state machine. `step` is
/// called once for `saslStart`'s payload and once per `saslContinue`.
pub trait Mechanism: Send {
    fn step(&mut self, payload: &[u8]) -> SaslResult<MechanismStep>;
}

/// Looks up the password an embedder has on file for `user` in `db`. SCRAM
/// derives the MongoDB-specific SHA-1 digest or uses the plain SHA-256
/// password itself from this.
pub trait CredentialStore: Send + Sync {
    fn password(&self, db: &str, user: &str) -> Option<String>;
}

/// A credential store with no users; every `saslStart` fails authentication.
/// Useful as a placeholder until an embedder wires a real one.
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn password(&self, _db: &str, _user: &str) -> Option<String> {
        None
    }
}

/// The server-wide monotonic conversation id allocator.
#[derive(Default)]
pub struct ConversationIdAllocator {
    next: AtomicI32,
}

impl ConversationIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Per-connection SASL state: the active mechanism plus the conversation id
/// the client must echo back on `saslContinue`.
pub struct SaslContext {
    pub conversation_id: i32,
    mechanism: Box<dyn Mechanism>,
}

impl SaslContext {
    pub fn new(conversation_id: i32, mechanism: Box<dyn Mechanism>) -> Self {
        Self {
            conversation_id,
            mechanism,
        }
    }

    /// Advances the conversation, rejecting a conversation id that does not
    /// match the one recorded at `saslStart`. A mismatched id is not part of
    /// the mechanism's own protocol vocabulary, so it always fails the
    /// command rather than producing a structured step reply.
    pub fn continue_with(&mut self, conversation_id: i32, payload: &[u8]) -> SaslResult<MechanismStep> {
        if conversation_id != self.conversation_id {
            return Err(SaslError::Unexpected(format!(
                "conversationId {conversation_id} does not match active conversation {}",
                self.conversation_id
            )));
        }
        self.mechanism.step(payload)
    }

    pub fn start(
        mechanism: Box<dyn Mechanism>,
        conversation_id: i32,
        payload: &[u8],
    ) -> SaslResult<(Self, MechanismStep)> {
        let mut ctx = Self::new(conversation_id, mechanism);
        let step = ctx.mechanism.step(payload)?;
        Ok((ctx, step))
    }
}

/// Builds a fresh mechanism instance for `name`, rejecting anything not
/// compiled in. `db`/`user` are
/// taken from the parsed `n=<user>` field of the client-first message inside
/// `step`, so the mechanism itself resolves credentials lazily; `db` is
/// passed here because it comes from `saslStart`'s `$db`, outside the SCRAM
/// wire payload.
pub fn mechanism_by_name(
    name: &str,
    db: &str,
    credentials: std::sync::Arc<dyn CredentialStore>,
) -> Option<Box<dyn Mechanism>> {
    match name {
        "SCRAM-SHA-1" => Some(Box::new(scram::ScramMechanism::new(
            scram::ScramVariant::Sha1,
            db.to_string(),
            credentials,
        ))),
        "SCRAM-SHA-256" => Some(Box::new(scram::ScramMechanism::new(
            scram::ScramVariant::Sha256,
            db.to_string(),
            credentials,
        ))),
        _ => None,
    }
}

/// The mechanism names this build advertises via `saslSupportedMechs`.
pub const SUPPORTED_MECHANISMS: &[&str] = &["SCRAM-SHA-1", "SCRAM-SHA-256"];
