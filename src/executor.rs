//! Executor traits, the default base handlers, and the `Dispatcher` that
//! wires an opcode message to the right one.
//!
//! `Dispatcher` is ordinary composition rather than inheritance: optional
//! `Arc<dyn Trait>` slots plus a built-in default for the two
//! always-available command groups (hello/buildInfo/getLastError, SASL).

use std::sync::Arc;

use async_trait::async_trait;

use crate::bson::Document;
use crate::command::{self, Classified, Command, Query, QueryKind};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::response;
use crate::sasl::{self, CredentialStore, ConversationIdAllocator, NoCredentials, SaslContext, SaslError};
use crate::wire::message::Message;

/// The outcome of a failed Insert/Update/Find/Delete call: a message plus,
/// for writes, however many documents the embedder reports it affected
/// before the failure.
#[derive(Debug, Clone)]
pub struct ExecutorError {
    pub message: String,
    pub partial_n: Option<i32>,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial_n: None,
        }
    }

    pub fn with_partial_n(message: impl Into<String>, n: i32) -> Self {
        Self {
            message: message.into(),
            partial_n: Some(n),
        }
    }
}

impl From<ExecutorError> for Error {
    fn from(e: ExecutorError) -> Self {
        Error::UserExecutor(e.message)
    }
}

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

/// Storage-backed CRUD, supplied entirely by the embedder.
#[async_trait]
pub trait UserCommandExecutor: Send + Sync {
    async fn insert(&self, conn: &mut Connection, query: &Query) -> ExecutorResult<i32>;
    async fn update(&self, conn: &mut Connection, query: &Query) -> ExecutorResult<(i32, i32)>;
    async fn find(&self, conn: &mut Connection, query: &Query) -> ExecutorResult<Vec<Document>>;
    async fn delete(&self, conn: &mut Connection, query: &Query) -> ExecutorResult<i32>;
}

/// `hello`/`isMaster`, `buildInfo`, `getLastError`.
#[async_trait]
pub trait DatabaseCommandExecutor: Send + Sync {
    async fn hello(&self, conn: &mut Connection, command: &Command, config: &Config) -> Document;
    async fn build_info(&self, conn: &mut Connection, command: &Command, config: &Config) -> Document;
    async fn get_last_error(&self, conn: &mut Connection, command: &Command) -> Document;
}

/// `saslStart`, `saslContinue`.
#[async_trait]
pub trait AuthCommandExecutor: Send + Sync {
    async fn sasl_start(&self, conn: &mut Connection, command: &Command) -> Document;
    async fn sasl_continue(&self, conn: &mut Connection, command: &Command) -> Document;
}

/// The built-in `hello`/`buildInfo`/`getLastError` handler, driven entirely
/// from [`Config`]. Embedders that need `getLastError` write tracking supply
/// their own `DatabaseCommandExecutor`.
pub struct DefaultDatabaseExecutor;

#[async_trait]
impl DatabaseCommandExecutor for DefaultDatabaseExecutor {
    async fn hello(&self, _conn: &mut Connection, command: &Command, config: &Config) -> Document {
        config.hello_document(command.get_str("saslSupportedMechs"))
    }

    async fn build_info(&self, _conn: &mut Connection, _command: &Command, config: &Config) -> Document {
        config.build_info_document()
    }

    async fn get_last_error(&self, _conn: &mut Connection, _command: &Command) -> Document {
        // No per-connection write journal is kept by the core; the default reports no error, which is the
        // behavior every driver treats as "last write succeeded."
        let mut b = crate::bson::DocumentBuilder::new();
        b.append_i32("n", 0).append_null("err").append_f64("ok", 1.0);
        b.build()
    }
}

/// The built-in SASL executor: runs the conversation state machine in
/// `sasl::` against a pluggable [`CredentialStore`].
pub struct DefaultAuthExecutor {
    credentials: Arc<dyn CredentialStore>,
    conversation_ids: ConversationIdAllocator,
}

impl DefaultAuthExecutor {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            conversation_ids: ConversationIdAllocator::new(),
        }
    }
}

impl Default for DefaultAuthExecutor {
    fn default() -> Self {
        Self::new(Arc::new(NoCredentials))
    }
}

#[async_trait]
impl AuthCommandExecutor for DefaultAuthExecutor {
    async fn sasl_start(&self, conn: &mut Connection, command: &Command) -> Document {
        let mechanism_name = match command.get_str("mechanism") {
            Some(m) => m,
            None => return response::failure("saslStart requires a mechanism"),
        };
        let payload = match command.get_binary("payload") {
            Some((_, data)) => data,
            None => return response::failure("saslStart requires a binary payload"),
        };
        let mechanism = match sasl::mechanism_by_name(mechanism_name, &command.database, self.credentials.clone()) {
            Some(m) => m,
            None => return response::failure(format!("unsupported mechanism {mechanism_name}")),
        };

        let conversation_id = self.conversation_ids.allocate();
        match SaslContext::start(mechanism, conversation_id, payload) {
            Ok((ctx, step)) => {
                let done = step.done;
                if done {
                    conn.authorized = true;
                }
                conn.sasl = Some(ctx);
                response::sasl_reply(conversation_id, &step.message, done)
            }
            Err(SaslError::Standard(msg)) => response::sasl_reply(conversation_id, msg.as_bytes(), false),
            Err(SaslError::Unexpected(msg)) => response::failure(msg),
        }
    }

    async fn sasl_continue(&self, conn: &mut Connection, command: &Command) -> Document {
        let conversation_id = match command.get_i32("conversationId") {
            Some(id) => id,
            None => return response::failure("saslContinue requires conversationId"),
        };
        let payload = match command.get_binary("payload") {
            Some((_, data)) => data,
            None => return response::failure("saslContinue requires a binary payload"),
        };
        let ctx = match conn.sasl.as_mut() {
            Some(ctx) => ctx,
            None => return response::failure("no SASL conversation in progress"),
        };
        match ctx.continue_with(conversation_id, payload) {
            Ok(step) => {
                let done = step.done;
                if done {
                    conn.authorized = true;
                    conn.sasl = None;
                }
                response::sasl_reply(conversation_id, &step.message, done)
            }
            Err(SaslError::Standard(msg)) => {
                conn.sasl = None;
                response::sasl_reply(conversation_id, msg.as_bytes(), false)
            }
            Err(SaslError::Unexpected(msg)) => {
                conn.sasl = None;
                response::failure(msg)
            }
        }
    }
}

/// Wires together the config and the three executor slots, and routes a
/// parsed [`Message`] through classification to the right one.
pub struct Dispatcher {
    pub config: Arc<Config>,
    pub user_executor: Option<Arc<dyn UserCommandExecutor>>,
    pub db_executor: Arc<dyn DatabaseCommandExecutor>,
    pub auth_executor: Arc<dyn AuthCommandExecutor>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, user_executor: Option<Arc<dyn UserCommandExecutor>>) -> Self {
        Self {
            config,
            user_executor,
            db_executor: Arc::new(DefaultDatabaseExecutor),
            auth_executor: Arc::new(DefaultAuthExecutor::default()),
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.auth_executor = Arc::new(DefaultAuthExecutor::new(credentials));
        self
    }

    pub fn with_auth_executor(mut self, executor: Arc<dyn AuthCommandExecutor>) -> Self {
        self.auth_executor = executor;
        self
    }

    pub fn with_db_executor(mut self, executor: Arc<dyn DatabaseCommandExecutor>) -> Self {
        self.db_executor = executor;
        self
    }

    /// Routes an incoming message to a response document.
    pub async fn handle(&self, conn: &mut Connection, msg: &Message) -> Result<Document> {
        match msg {
            Message::Update(_) => Ok(response::not_implemented("update (legacy opcode)")),
            Message::Insert(_) => Ok(response::not_implemented("insert (legacy opcode)")),
            Message::Delete(_) => Ok(response::not_implemented("delete (legacy opcode)")),
            Message::GetMore(_) => Ok(response::not_implemented("getMore")),
            Message::KillCursors(_) => Ok(response::kill_cursors_ack()),
            Message::Query(_) | Message::Msg(_) => match command::classify(msg)? {
                Classified::Query(q) => self.dispatch_query(conn, q).await,
                Classified::Command(cmd) => self.dispatch_command(conn, cmd).await,
            },
            Message::Reply(_) => Err(Error::UnsupportedOp("server does not accept OP_REPLY requests".to_string())),
        }
    }

    async fn dispatch_query(&self, conn: &mut Connection, query: Query) -> Result<Document> {
        let executor = self.user_executor.as_ref().ok_or_else(|| {
            Error::UnsupportedOp(format!("no user executor installed for {:?}", query.kind))
        })?;

        match query.kind {
            QueryKind::Insert => Ok(match executor.insert(conn, &query).await {
                Ok(n) => response::write_ack(n),
                Err(e) => response::write_failure(e.partial_n.unwrap_or(0), e.message),
            }),
            QueryKind::Update => Ok(match executor.update(conn, &query).await {
                Ok((n, modified)) => response::update_ack(n, modified),
                Err(e) => response::write_failure(e.partial_n.unwrap_or(0), e.message),
            }),
            QueryKind::Delete => Ok(match executor.delete(conn, &query).await {
                Ok(n) => response::write_ack(n),
                Err(e) => response::write_failure(e.partial_n.unwrap_or(0), e.message),
            }),
            QueryKind::Find => {
                let docs = executor.find(conn, &query).await?;
                Ok(response::cursor_reply(docs, &query.namespace()))
            }
            QueryKind::KillCursors => Ok(response::kill_cursors_ack()),
        }
    }

    async fn dispatch_command(&self, conn: &mut Connection, cmd: Command) -> Result<Document> {
        match cmd.command_type.as_str() {
            "hello" | "ismaster" => Ok(self.db_executor.hello(conn, &cmd, &self.config).await),
            "buildinfo" => Ok(self.db_executor.build_info(conn, &cmd, &self.config).await),
            "getlasterror" => Ok(self.db_executor.get_last_error(conn, &cmd).await),
            "saslstart" => Ok(self.auth_executor.sasl_start(conn, &cmd).await),
            "saslcontinue" => Ok(self.auth_executor.sasl_continue(conn, &cmd).await),
            _ if cmd.is_admin => Ok(response::ok()),
            _ => Ok(response::failure(format!("no such command: '{}'", cmd.command_type))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::DocumentBuilder;
    use crate::wire::op_msg::OpMsg;
    use tokio::sync::Mutex as AsyncMutex;

    struct MemoryExecutor {
        docs: AsyncMutex<Vec<Document>>,
    }

    #[async_trait]
    impl UserCommandExecutor for MemoryExecutor {
        async fn insert(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<i32> {
            let mut docs = self.docs.lock().await;
            let n = query.documents.len() as i32;
            docs.extend(query.documents.iter().cloned());
            Ok(n)
        }

        async fn update(&self, _conn: &mut Connection, _query: &Query) -> ExecutorResult<(i32, i32)> {
            Ok((0, 0))
        }

        async fn find(&self, _conn: &mut Connection, _query: &Query) -> ExecutorResult<Vec<Document>> {
            Ok(self.docs.lock().await.clone())
        }

        async fn delete(&self, _conn: &mut Connection, _query: &Query) -> ExecutorResult<i32> {
            Ok(0)
        }
    }

    fn msg_with_body(body: Document) -> Message {
        Message::Msg(OpMsg::with_body(body))
    }

    #[tokio::test]
    async fn hello_uses_default_database_executor() {
        let dispatcher = Dispatcher::new(Arc::new(Config::default()), None);
        let mut conn = Connection::new(tracing::Span::none());
        let mut b = DocumentBuilder::new();
        b.append_i32("hello", 1).append_str("$db", "admin");
        let reply = dispatcher.handle(&mut conn, &msg_with_body(b.build())).await.unwrap();
        assert_eq!(reply.get_bool("ismaster"), Some(true));
        assert_eq!(reply.get_f64("ok"), Some(1.0));
    }

    #[tokio::test]
    async fn unknown_admin_command_returns_ok() {
        let dispatcher = Dispatcher::new(Arc::new(Config::default()), None);
        let mut conn = Connection::new(tracing::Span::none());
        let mut b = DocumentBuilder::new();
        b.append_i32("whatsmyuri", 1).append_str("$db", "admin");
        let reply = dispatcher.handle(&mut conn, &msg_with_body(b.build())).await.unwrap();
        assert_eq!(reply.get_f64("ok"), Some(1.0));
    }

    #[tokio::test]
    async fn unknown_user_command_fails() {
        let dispatcher = Dispatcher::new(Arc::new(Config::default()), None);
        let mut conn = Connection::new(tracing::Span::none());
        let mut b = DocumentBuilder::new();
        b.append_i32("doSomethingWeird", 1).append_str("$db", "test");
        let reply = dispatcher.handle(&mut conn, &msg_with_body(b.build())).await.unwrap();
        assert_eq!(reply.get_f64("ok"), Some(0.0));
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_through_memory_executor() {
        let user_executor: Arc<dyn UserCommandExecutor> = Arc::new(MemoryExecutor {
            docs: AsyncMutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::new(Arc::new(Config::default()), Some(user_executor));
        let mut conn = Connection::new(tracing::Span::none());

        let mut doc = DocumentBuilder::new();
        doc.append_i32("_id", 1).append_str("name", "Ash");
        let mut insert_body = DocumentBuilder::new();
        insert_body.append_str("insert", "trainers").append_str("$db", "test");
        let insert_msg = Message::Msg(OpMsg {
            flag_bits: 0,
            body: Some(insert_body.build()),
            sequences: vec![crate::wire::op_msg::DocumentSequence {
                identifier: "documents".to_string(),
                documents: vec![doc.build()],
            }],
            checksum: None,
        });
        let reply = dispatcher.handle(&mut conn, &insert_msg).await.unwrap();
        assert_eq!(reply.get_i32("n"), Some(1));

        let mut find_body = DocumentBuilder::new();
        find_body.append_str("find", "trainers").append_str("$db", "test");
        let find_reply = dispatcher
            .handle(&mut conn, &msg_with_body(find_body.build()))
            .await
            .unwrap();
        let cursor = find_reply.get_document("cursor").unwrap();
        let batch = cursor.get_array("firstBatch").unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn no_user_executor_installed_reports_unsupported() {
        let dispatcher = Dispatcher::new(Arc::new(Config::default()), None);
        let mut conn = Connection::new(tracing::Span::none());
        let mut body = DocumentBuilder::new();
        body.append_str("insert", "trainers").append_str("$db", "test");
        let err = dispatcher.handle(&mut conn, &msg_with_body(body.build())).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedOp(_)));
    }
}
