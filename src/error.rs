//! The error taxonomy: each variant is a *kind*, not a status code, and the
//! connection loop (`server.rs`) matches on the kind to decide whether to
//! close the connection or answer with a "bad" response and keep looping.

use std::result::Result as StdResult;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Short read on header/body, malformed length, or unrecognized opcode.
    /// Policy: close the connection.
    #[error("framing error: {0}")]
    Framing(String),

    /// Truncated or malformed BSON within a parsed opcode, or a missing
    /// required field. Policy: answer the same request with a "bad"
    /// response document and keep looping.
    #[error("decode error: {0}")]
    Decode(String),

    /// No handler installed for the opcode. Same policy as `Decode`.
    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),

    /// The command type is unknown to every installed executor. Policy:
    /// `{ok: 1.0}` for unknown admin commands (handshake compatibility),
    /// `{ok: 0.0, errmsg}` for unimplemented user commands.
    #[error("command not supported: {0}")]
    CommandNotSupported(String),

    /// The embedder's Insert/Update/Find/Delete executor returned an error.
    #[error("executor error: {0}")]
    UserExecutor(String),

    /// Missing/incorrect SASL context, conversation id mismatch, or unknown
    /// mechanism. Policy: fail the command, do not close the connection.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid TLS material at server start. Policy: refuse to start.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Whether this error kind should terminate the connection loop (see the
    /// per-variant policy notes above).
    pub fn closes_connection(&self) -> bool {
        matches!(self, Error::Framing(_) | Error::Io(_))
    }
}

pub type Result<T> = StdResult<T, Error>;
