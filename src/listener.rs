//! `MessageListener`: data hooks fired around each request/response pair.
//! Span-based tracing (`tracing::info_span!` et al., opened directly in
//! `server.rs`) covers timing/correlation; this trait covers the half that
//! needs the actual parsed message, not just a span.

use std::sync::Arc;

use crate::bson::Document;
use crate::wire::message::Message;

/// Observes messages as they arrive and the responses the dispatcher sends
/// back. Default no-op implementations let embedders override only what
/// they need.
pub trait MessageListener: Send + Sync {
    fn message_received(&self, _msg: &Message) {}
    fn message_responded(&self, _response: &Document) {}
}

/// The default listener: observes nothing.
pub struct NoopListener;

impl MessageListener for NoopListener {}

pub fn default_listener() -> Arc<dyn MessageListener> {
    Arc::new(NoopListener)
}
