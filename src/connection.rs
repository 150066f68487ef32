//! Per-connection state and the server-wide connection set.
//!
//! Explicit typed fields for the state every connection actually carries
//! (SASL context slot, authorized flag, TLS peer CN, UUID, creation time),
//! with an opaque user-scoped bag kept separately for embedder-defined
//! state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use uuid::Uuid;

use crate::bson::Value;
use crate::sasl::SaslContext;

/// All per-connection state. Owned by that connection's task, so it needs
/// no internal locking — only one task ever touches it.
pub struct Connection {
    pub id: Uuid,
    pub created_at: Instant,
    pub authorized: bool,
    pub tls_peer_cn: Option<String>,
    pub sasl: Option<SaslContext>,
    /// Opaque per-connection bag for embedder-defined state, kept separate
    /// from the protocol-core fields above.
    pub state: HashMap<String, Value>,
    pub span: tracing::Span,
}

impl Connection {
    pub fn new(span: tracing::Span) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            authorized: false,
            tls_peer_cn: None,
            sasl: None,
            state: HashMap::new(),
            span,
        }
    }
}

/// The server-wide concurrent set of live connections.
/// Holds only the bookkeeping a server needs to enumerate or count live
/// connections; actual per-connection mutable state stays with the owning
/// task, never here.
#[derive(Default)]
pub struct ConnManager {
    ids: Mutex<HashMap<Uuid, Instant>>,
}

impl ConnManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: Uuid) {
        self.ids.lock().unwrap().insert(id, Instant::now());
    }

    pub fn deregister(&self, id: Uuid) {
        self.ids.lock().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_deregister_tracks_count() {
        let mgr = ConnManager::new();
        let id = Uuid::new_v4();
        mgr.register(id);
        assert_eq!(mgr.len(), 1);
        mgr.deregister(id);
        assert!(mgr.is_empty());
    }

    #[test]
    fn new_connection_is_unauthorized_with_no_sasl_context() {
        let conn = Connection::new(tracing::Span::none());
        assert!(!conn.authorized);
        assert!(conn.sasl.is_none());
        assert!(conn.tls_peer_cn.is_none());
    }
}
