//! Command & Query classification: turns a parsed OP_QUERY or
//! OP_MSG into either a database [`Command`] (isMaster/hello, buildInfo,
//! getLastError, saslStart/saslContinue, ...) or a CRUD [`Query`].
//!
//! One shared classifier lives here and is reused by both OP_QUERY and
//! OP_MSG paths in `executor.rs`, rather than duplicating the parsing per
//! opcode.

use crate::bson::{Document, Value};
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::wire::message::Message;
use crate::wire::op_msg::OpMsg;

/// The five CRUD query kinds the classifier recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Insert,
    Update,
    Find,
    Delete,
    KillCursors,
}

impl QueryKind {
    fn from_command_type(s: &str) -> Option<QueryKind> {
        match s {
            "insert" => Some(QueryKind::Insert),
            "update" => Some(QueryKind::Update),
            "find" => Some(QueryKind::Find),
            "delete" => Some(QueryKind::Delete),
            "killcursors" => Some(QueryKind::KillCursors),
            _ => None,
        }
    }
}

/// A request whose semantics are named by the first key of its body
/// document. Derived, never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct Command {
    pub is_admin: bool,
    pub command_type: String,
    pub database: String,
    pub elements: Vec<(String, Value)>,
    pub body: Document,
}

impl Command {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.elements.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Value::as_i32)
    }

    pub fn get_binary(&self, key: &str) -> Option<(u8, &[u8])> {
        self.get(key).and_then(Value::as_binary)
    }
}

/// A CRUD request against a named collection.
#[derive(Debug, Clone)]
pub struct Query {
    pub database: String,
    pub collection: String,
    pub kind: QueryKind,
    pub conditions: Vec<Document>,
    pub documents: Vec<Document>,
    pub operator: Option<String>,
    pub limit: Option<i32>,
}

impl Query {
    pub fn namespace(&self) -> String {
        Namespace::new(&self.database, &self.collection).full()
    }
}

pub enum Classified {
    Command(Command),
    Query(Query),
}

/// Classifies a parsed OP_QUERY or OP_MSG message.
pub fn classify(msg: &Message) -> Result<Classified> {
    match msg {
        Message::Query(q) => classify_legacy_query(q.is_admin_command(), &q.full_collection_name, &q.query),
        Message::Msg(m) => classify_op_msg(m),
        _ => Err(Error::UnsupportedOp(format!(
            "classifier does not accept opcode {}",
            msg.op_code()
        ))),
    }
}

fn first_key_and_type(body: &Document) -> Result<(String, String)> {
    let (key, _) = body
        .iter()
        .next()
        .ok_or_else(|| Error::Decode("empty command document".to_string()))?;
    let command_type = key.to_lowercase();
    Ok((key, command_type))
}

fn classify_legacy_query(is_admin: bool, full_collection_name: &str, body: &Document) -> Result<Classified> {
    let (first_key, command_type) = first_key_and_type(body)?;
    let database = body.get_str("$db").unwrap_or_else(|| {
        Namespace::parse_full_collection_name(full_collection_name)
            .map(|ns| ns.database)
            .unwrap_or_default()
    });

    if let Some(kind) = QueryKind::from_command_type(&command_type) {
        let collection = body
            .get_str(&first_key)
            .ok_or_else(|| Error::Decode(format!("{first_key} must be a string collection name")))?;
        let mut query = Query {
            database,
            collection,
            kind,
            conditions: Vec::new(),
            documents: Vec::new(),
            operator: None,
            limit: body.get_i32("limit"),
        };
        populate_crud_fields(&mut query, body, None);
        return Ok(Classified::Query(query));
    }

    Ok(Classified::Command(Command {
        is_admin,
        command_type,
        database,
        elements: body.iter().collect(),
        body: body.clone(),
    }))
}

fn classify_op_msg(msg: &OpMsg) -> Result<Classified> {
    let body = msg
        .body
        .as_ref()
        .ok_or_else(|| Error::Decode("OP_MSG missing section-0 body".to_string()))?;
    let (first_key, command_type) = first_key_and_type(body)?;
    let database = body.get_str("$db").unwrap_or_default();
    let is_admin = database == "admin";

    if let Some(kind) = QueryKind::from_command_type(&command_type) {
        let collection = body
            .get_str(&first_key)
            .ok_or_else(|| Error::Decode(format!("{first_key} must be a string collection name")))?;
        let mut query = Query {
            database,
            collection,
            kind,
            conditions: Vec::new(),
            documents: Vec::new(),
            operator: None,
            limit: body.get_i32("limit"),
        };
        populate_crud_fields(&mut query, body, Some(msg));
        return Ok(Classified::Query(query));
    }

    Ok(Classified::Command(Command {
        is_admin,
        command_type,
        database,
        elements: body.iter().collect(),
        body: body.clone(),
    }))
}

/// Reads a named array-or-document-sequence field, preferring the OP_MSG
/// document sequence (section type 1) when present and falling back to an
/// inline BSON array of the same name (legacy OP_QUERY embeds everything
/// inline; OP_MSG may use either form).
fn named_documents(body: &Document, msg: Option<&OpMsg>, name: &str) -> Vec<Document> {
    if let Some(msg) = msg {
        if let Some(seq) = msg.sequence_named(name) {
            return seq.to_vec();
        }
    }
    body.get_array(name)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::Document(d) => Some(d),
            _ => None,
        })
        .collect()
}

fn populate_crud_fields(query: &mut Query, body: &Document, msg: Option<&OpMsg>) {
    match query.kind {
        QueryKind::Find => {
            if let Some(filter) = body.get_document("filter") {
                query.conditions.push(filter);
            }
        }
        QueryKind::Insert => {
            query.documents = named_documents(body, msg, "documents");
        }
        QueryKind::Delete => {
            for item in named_documents(body, msg, "deletes") {
                if let Some(q) = item.get_document("q") {
                    query.conditions.push(q);
                }
            }
        }
        QueryKind::Update => {
            // rule 4: each `updates` item contributes `q` to
            // conditions and `u`'s first element (the operator, e.g. `$set`)
            // and its value document to `documents`/`operator`.
            for item in named_documents(body, msg, "updates") {
                if let Some(q) = item.get_document("q") {
                    query.conditions.push(q);
                }
                if let Some(u) = item.get_document("u") {
                    if let Some((op_key, op_val)) = u.iter().next() {
                        query.operator = Some(op_key.clone());
                        if let Value::Document(doc) = op_val {
                            query.documents.push(doc);
                        }
                    }
                }
            }
        }
        QueryKind::KillCursors => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::DocumentBuilder;
    use crate::wire::op_msg::DocumentSequence;

    fn msg_with_body(body: Document) -> OpMsg {
        OpMsg {
            flag_bits: 0,
            body: Some(body),
            sequences: Vec::new(),
            checksum: None,
        }
    }

    #[test]
    fn classifies_hello_as_command() {
        let mut b = DocumentBuilder::new();
        b.append_i32("hello", 1).append_str("$db", "admin");
        let msg = Message::Msg(msg_with_body(b.build()));
        match classify(&msg).unwrap() {
            Classified::Command(cmd) => {
                assert_eq!(cmd.command_type, "hello");
                assert!(cmd.is_admin);
            }
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn classifies_insert_with_document_sequence() {
        let mut b = DocumentBuilder::new();
        b.append_str("insert", "trainers").append_str("$db", "test");
        let mut doc = DocumentBuilder::new();
        doc.append_i32("_id", 1).append_str("name", "Ash");
        let op = OpMsg {
            flag_bits: 0,
            body: Some(b.build()),
            sequences: vec![DocumentSequence {
                identifier: "documents".to_string(),
                documents: vec![doc.build()],
            }],
            checksum: None,
        };
        match classify(&Message::Msg(op)).unwrap() {
            Classified::Query(q) => {
                assert_eq!(q.kind, QueryKind::Insert);
                assert_eq!(q.collection, "trainers");
                assert_eq!(q.database, "test");
                assert_eq!(q.documents.len(), 1);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn classifies_update_set_operator() {
        let mut b = DocumentBuilder::new();
        b.append_str("update", "trainers").append_str("$db", "test");
        let mut q_doc = DocumentBuilder::new();
        q_doc.append_str("name", "Ash");
        let mut set_doc = DocumentBuilder::new();
        set_doc.append_i32("age", 11);
        let mut u_doc = DocumentBuilder::new();
        u_doc.append_document("$set", set_doc.build());
        let mut update_item = DocumentBuilder::new();
        update_item.append_document("q", q_doc.build());
        update_item.append_document("u", u_doc.build());

        let op = OpMsg {
            flag_bits: 0,
            body: Some(b.build()),
            sequences: vec![DocumentSequence {
                identifier: "updates".to_string(),
                documents: vec![update_item.build()],
            }],
            checksum: None,
        };
        match classify(&Message::Msg(op)).unwrap() {
            Classified::Query(q) => {
                assert_eq!(q.operator.as_deref(), Some("$set"));
                assert_eq!(q.conditions.len(), 1);
                assert_eq!(q.documents[0].get_i32("age"), Some(11));
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn command_type_is_lowercased() {
        let mut b = DocumentBuilder::new();
        b.append_i32("ismaster", 1).append_str("$db", "admin");
        match classify(&Message::Msg(msg_with_body(b.build()))).unwrap() {
            Classified::Command(cmd) => assert_eq!(cmd.command_type, "ismaster"),
            _ => panic!("expected command"),
        }
    }
}
