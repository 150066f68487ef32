//! Listener/accept loop and the per-connection receive-dispatch-respond
//! cycle.
//!
//! `tokio::spawn` per connection, `tracing` spans around accept/parse/
//! dispatch/respond.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::bson::{Document, DocumentBuilder};
use crate::config::Config;
use crate::connection::{Connection, ConnManager};
use crate::error::{Error, Result};
use crate::executor::Dispatcher;
use crate::listener::{default_listener, MessageListener};
use crate::tls;
use crate::wire::header::{MessageHeader, HEADER_SIZE};
use crate::wire::message::Message;
use crate::wire::op_msg::OpMsg;
use crate::wire::op_reply::OpReply;

/// Server-wide monotonic requestID counter; wraps from `i32::MAX` back to 0.
#[derive(Default)]
struct RequestIdAllocator {
    next: AtomicI32,
}

impl RequestIdAllocator {
    fn allocate(&self) -> i32 {
        loop {
            let current = self.next.load(Ordering::Relaxed);
            let next = if current == i32::MAX { 0 } else { current + 1 };
            if self
                .next
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return current;
            }
        }
    }
}

pub struct Server {
    config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    conn_manager: Arc<ConnManager>,
    listener: Arc<dyn MessageListener>,
    tls_acceptor: Option<tokio_rustls::TlsAcceptor>,
    request_ids: Arc<RequestIdAllocator>,
}

impl Server {
    pub fn new(config: Arc<Config>, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        config.validate()?;
        let tls_acceptor = tls::build_tls_acceptor(&config)?;
        Ok(Self {
            config,
            dispatcher,
            conn_manager: Arc::new(ConnManager::new()),
            listener: default_listener(),
            tls_acceptor,
            request_ids: Arc::new(RequestIdAllocator::default()),
        })
    }

    pub fn with_message_listener(mut self, listener: Arc<dyn MessageListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Binds the configured address without accepting connections yet —
    /// split out from [`Server::run`] so callers (tests, embedders that want
    /// an ephemeral port) can read back the actual bound address before
    /// serving.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(&self.config.listen_addr).await?)
    }

    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Runs the accept loop against an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        tracing::info!(listen_addr = %self.config.listen_addr, "oxidedb listening");

        loop {
            let (socket, addr) = listener.accept().await?;
            let dispatcher = self.dispatcher.clone();
            let conn_manager = self.conn_manager.clone();
            let msg_listener = self.listener.clone();
            let request_ids = self.request_ids.clone();
            let tls_acceptor = self.tls_acceptor.clone();

            tokio::spawn(async move {
                let span = tracing::info_span!("connection", %addr);
                match tls_acceptor {
                    Some(acceptor) => match tls::accept(&acceptor, socket).await {
                        Ok((stream, peer_cn)) => {
                            let mut conn = Connection::new(span);
                            conn.tls_peer_cn = peer_cn;
                            run_session(stream, conn, dispatcher, conn_manager, msg_listener, request_ids).await;
                        }
                        Err(e) => tracing::debug!(error = %e, "TLS handshake failed"),
                    },
                    None => {
                        let conn = Connection::new(span);
                        run_session(socket, conn, dispatcher, conn_manager, msg_listener, request_ids).await;
                    }
                }
            });
        }
    }
}

/// Reads exactly `buf.len()` bytes, treating EOF or a partial read as a
/// framing error.
async fn read_exact_or_framing_error<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> Result<()> {
    stream
        .read_exact(buf)
        .await
        .map_err(|e| Error::Framing(format!("short read: {e}")))?;
    Ok(())
}

async fn run_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    mut conn: Connection,
    dispatcher: Arc<Dispatcher>,
    conn_manager: Arc<ConnManager>,
    msg_listener: Arc<dyn MessageListener>,
    request_ids: Arc<RequestIdAllocator>,
) {
    conn_manager.register(conn.id);
    tracing::debug!(conn_id = %conn.id, "connection registered");

    loop {
        match serve_one_request(&mut stream, &mut conn, &dispatcher, &msg_listener, &request_ids).await {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id, error = %e, "connection loop exiting");
                break;
            }
        }
    }

    conn_manager.deregister(conn.id);
    let _ = stream.shutdown().await;
    tracing::debug!(conn_id = %conn.id, "connection deregistered");
}

/// Serves one request/response cycle. Returns `Ok(true)` to keep looping,
/// `Ok(false)` on a clean EOF, `Err` to close the connection.
async fn serve_one_request<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    conn: &mut Connection,
    dispatcher: &Dispatcher,
    msg_listener: &Arc<dyn MessageListener>,
    request_ids: &RequestIdAllocator,
) -> Result<bool> {
    let mut header_buf = [0u8; HEADER_SIZE];
    match stream.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(Error::Framing(format!("short read on header: {e}"))),
    }
    let (header, _) = MessageHeader::parse(&header_buf).ok_or_else(|| Error::Framing("malformed header".to_string()))?;

    let body_len = (header.message_length as usize)
        .checked_sub(HEADER_SIZE)
        .ok_or_else(|| Error::Framing("message_length shorter than header".to_string()))?;
    let mut body = vec![0u8; body_len];
    read_exact_or_framing_error(stream, &mut body).await?;

    let request_id = header.request_id;
    let response = match Message::parse(&header, &body) {
        Ok(msg) => {
            msg_listener.message_received(&msg);
            match dispatcher.handle(conn, &msg).await {
                Ok(doc) => to_response_message(&msg, doc),
                Err(e) if e.closes_connection() => return Err(e),
                Err(e) => to_response_message(&msg, bad_response(&e)),
            }
        }
        Err(e) if e.closes_connection() => return Err(e),
        Err(e) => {
            // Body failed to parse as its declared opcode: we still know the
            // opcode (it's in the header), so answer with a shape the client
            // can actually parse rather than closing — OP_MSG-wrapped for an
            // OP_MSG request, OP_REPLY otherwise.
            response_for_unparseable_body(header.op_code, bad_response(&e))
        }
    };

    let assigned_id = request_ids.allocate();
    let bytes = response.bytes(assigned_id, request_id);
    stream.write_all(&bytes).await.map_err(|e| Error::Framing(format!("write failed: {e}")))?;
    if let Some(doc) = response.primary_document() {
        msg_listener.message_responded(doc);
    }

    Ok(true)
}

/// Wraps a response document the same way the request arrived: OP_MSG body
/// for OP_MSG requests, a single-document OP_REPLY otherwise.
fn to_response_message(request: &Message, doc: Document) -> Message {
    match request {
        Message::Msg(_) => Message::Msg(OpMsg::with_body(doc)),
        _ => Message::Reply(OpReply::with_documents(vec![doc])),
    }
}

/// Same wrapping choice as [`to_response_message`], but for the case where
/// the body never parsed into a [`Message`] at all — decided from the raw
/// header opcode instead of a parsed request.
fn response_for_unparseable_body(op_code: i32, doc: Document) -> Message {
    if op_code == crate::wire::opcode::OP_MSG {
        Message::Msg(OpMsg::with_body(doc))
    } else {
        Message::Reply(OpReply::with_documents(vec![doc]))
    }
}

fn bad_response(e: &Error) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_f64("ok", 0.0).append_str("errmsg", e.to_string());
    b.build()
}
