//! Shared bench harness: an in-memory executor and a couple of wire-level
//! helpers, duplicated from `tests/server_e2e.rs`'s `TestStore` rather than
//! shared via a dependency edge, since a `tests/`-crate dependency would pull
//! `dev-dependencies` into the bench build unnecessarily.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use oxidedb::bson::{Document, DocumentBuilder};
use oxidedb::command::Query;
use oxidedb::config::Config;
use oxidedb::connection::Connection;
use oxidedb::executor::{Dispatcher, ExecutorError, ExecutorResult, UserCommandExecutor};
use oxidedb::server::Server;
use oxidedb::wire::header::{MessageHeader, HEADER_SIZE};
use oxidedb::wire::message::Message;
use oxidedb::wire::op_msg::{DocumentSequence, OpMsg};

#[derive(Default)]
pub struct MemoryExecutor {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, want)| match doc.get(&k) {
        Some(have) => have == want,
        None => false,
    })
}

#[async_trait]
impl UserCommandExecutor for MemoryExecutor {
    async fn insert(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<i32> {
        let mut colls = self.collections.lock().await;
        colls.entry(query.namespace()).or_default().extend(query.documents.iter().cloned());
        Ok(query.documents.len() as i32)
    }

    async fn find(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<Vec<Document>> {
        let colls = self.collections.lock().await;
        let Some(coll) = colls.get(&query.namespace()) else {
            return Ok(Vec::new());
        };
        let matched = coll.iter().filter(|d| query.conditions.iter().all(|f| matches(d, f))).cloned();
        Ok(match query.limit {
            Some(n) if n > 0 => matched.take(n as usize).collect(),
            _ => matched.collect(),
        })
    }

    async fn update(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<(i32, i32)> {
        Err(ExecutorError::new(format!("update not exercised by benches: {:?}", query.operator)))
    }

    async fn delete(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<i32> {
        let mut colls = self.collections.lock().await;
        let Some(coll) = colls.get_mut(&query.namespace()) else {
            return Ok(0);
        };
        let before = coll.len();
        coll.retain(|d| !query.conditions.iter().all(|f| matches(d, f)));
        Ok((before - coll.len()) as i32)
    }
}

/// Binds a fresh server on an ephemeral port and returns a connected stream.
pub async fn setup_server() -> TcpStream {
    let mut cfg = Config::default();
    cfg.listen_addr = "127.0.0.1:0".to_string();
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(cfg.clone()), Some(Arc::new(MemoryExecutor::default()))));
    let server = Server::new(Arc::new(cfg), dispatcher).unwrap();
    let listener: TcpListener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    TcpStream::connect(addr).await.unwrap()
}

pub async fn send_command(stream: &mut TcpStream, body: Document, request_id: i32) {
    let bytes = Message::Msg(OpMsg::with_body(body)).bytes(request_id, 0);
    stream.write_all(&bytes).await.unwrap();
}

pub async fn send_insert(stream: &mut TcpStream, collection: &str, db: &str, documents: Vec<Document>, request_id: i32) {
    let mut body = DocumentBuilder::new();
    body.append_str("insert", collection).append_str("$db", db);
    let msg = OpMsg {
        flag_bits: 0,
        body: Some(body.build()),
        sequences: vec![DocumentSequence {
            identifier: "documents".to_string(),
            documents,
        }],
        checksum: None,
    };
    let bytes = Message::Msg(msg).bytes(request_id, 0);
    stream.write_all(&bytes).await.unwrap();
}

pub async fn read_reply(stream: &mut TcpStream) -> Document {
    let mut header_buf = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header_buf).await.unwrap();
    let (header, _) = MessageHeader::parse(&header_buf).unwrap();
    let mut body = vec![0u8; header.message_length as usize - HEADER_SIZE];
    stream.read_exact(&mut body).await.unwrap();
    Message::parse(&header, &body).unwrap().primary_document().unwrap().clone()
}
