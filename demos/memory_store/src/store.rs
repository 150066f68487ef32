//! An in-process `HashMap<namespace, Vec<Document>>` implementing
//! `UserCommandExecutor`, standing in for the external document store the
//! core crate deliberately has no opinion about. No schema, no query
//! translation, no on-disk persistence — restarting the process empties
//! every collection.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use oxidedb::bson::{Document, Value};
use oxidedb::command::Query;
use oxidedb::connection::Connection;
use oxidedb::executor::{ExecutorError, ExecutorResult, UserCommandExecutor};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Loose cross-numeric-type equality: a `find({"age": 30})` filter written
/// as an Int32 must still match a stored Int64 or Double of the same
/// magnitude, since BSON drivers don't agree on which width to send.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, want)| match doc.get(&key) {
        Some(have) => values_equal(&have, &want),
        None => matches!(want, Value::Null),
    })
}

#[async_trait]
impl UserCommandExecutor for MemoryStore {
    async fn insert(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<i32> {
        let ns = query.namespace();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(ns).or_default();
        coll.extend(query.documents.iter().cloned());
        Ok(query.documents.len() as i32)
    }

    async fn find(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<Vec<Document>> {
        let ns = query.namespace();
        let collections = self.collections.read().await;
        let coll = match collections.get(&ns) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };
        let matched = coll
            .iter()
            .filter(|doc| query.conditions.iter().all(|f| matches_filter(doc, f)))
            .cloned();
        Ok(match query.limit {
            Some(n) if n > 0 => matched.take(n as usize).collect(),
            _ => matched.collect(),
        })
    }

    async fn update(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<(i32, i32)> {
        let ns = query.namespace();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(ns).or_default();

        let filter = query.conditions.first();
        let set_fields = query.documents.first();
        let is_set = query.operator.as_deref() == Some("$set");

        let mut matched = 0;
        let mut modified = 0;
        for doc in coll.iter_mut() {
            let hit = match filter {
                Some(f) => matches_filter(doc, f),
                None => true,
            };
            if !hit {
                continue;
            }
            matched += 1;
            if let (true, Some(set)) = (is_set, set_fields) {
                *doc = merge_set(doc, set);
                modified += 1;
            } else if !is_set {
                return Err(ExecutorError::with_partial_n(
                    format!("unsupported update operator {:?}", query.operator),
                    modified,
                ));
            }
        }
        Ok((matched, modified))
    }

    async fn delete(&self, _conn: &mut Connection, query: &Query) -> ExecutorResult<i32> {
        let ns = query.namespace();
        let mut collections = self.collections.write().await;
        let coll = match collections.get_mut(&ns) {
            Some(c) => c,
            None => return Ok(0),
        };
        let before = coll.len();
        coll.retain(|doc| !query.conditions.iter().all(|f| matches_filter(doc, f)));
        Ok((before - coll.len()) as i32)
    }
}

/// Applies a `$set` document on top of an existing one: overwrite named
/// keys, append unseen ones, leave everything else as-is.
fn merge_set(existing: &Document, set: &Document) -> Document {
    let mut b = oxidedb::bson::DocumentBuilder::new();
    for (key, value) in existing.iter() {
        if set.get(&key).is_none() {
            b.append(key, value);
        }
    }
    for (key, value) in set.iter() {
        b.append(key, value);
    }
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidedb::bson::DocumentBuilder;
    use oxidedb::command::QueryKind;
    use tracing::Span;

    fn conn() -> Connection {
        Connection::new(Span::none())
    }

    fn query(kind: QueryKind) -> Query {
        Query {
            database: "test".to_string(),
            collection: "trainers".to_string(),
            kind,
            conditions: Vec::new(),
            documents: Vec::new(),
            operator: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips() {
        let store = MemoryStore::new();
        let mut conn = conn();

        let mut doc = DocumentBuilder::new();
        doc.append_str("name", "Ash").append_i32("age", 10);
        let mut q = query(QueryKind::Insert);
        q.documents = vec![doc.build()];
        assert_eq!(store.insert(&mut conn, &q).await.unwrap(), 1);

        let mut find_q = query(QueryKind::Find);
        let mut filter = DocumentBuilder::new();
        filter.append_str("name", "Ash");
        find_q.conditions = vec![filter.build()];
        let found = store.find(&mut conn, &find_q).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_i32("age"), Some(10));
    }

    #[tokio::test]
    async fn update_set_modifies_matching_documents() {
        let store = MemoryStore::new();
        let mut conn = conn();

        let mut doc = DocumentBuilder::new();
        doc.append_str("name", "Ash").append_i32("age", 10);
        let mut insert_q = query(QueryKind::Insert);
        insert_q.documents = vec![doc.build()];
        store.insert(&mut conn, &insert_q).await.unwrap();

        let mut update_q = query(QueryKind::Update);
        let mut filter = DocumentBuilder::new();
        filter.append_str("name", "Ash");
        update_q.conditions = vec![filter.build()];
        let mut set_doc = DocumentBuilder::new();
        set_doc.append_i32("age", 11);
        update_q.documents = vec![set_doc.build()];
        update_q.operator = Some("$set".to_string());

        let (matched, modified) = store.update(&mut conn, &update_q).await.unwrap();
        assert_eq!(matched, 1);
        assert_eq!(modified, 1);

        let found = store.find(&mut conn, &query(QueryKind::Find)).await.unwrap();
        assert_eq!(found[0].get_i32("age"), Some(11));
    }

    #[tokio::test]
    async fn delete_removes_matching_documents() {
        let store = MemoryStore::new();
        let mut conn = conn();

        let mut doc = DocumentBuilder::new();
        doc.append_str("name", "Ash");
        let mut insert_q = query(QueryKind::Insert);
        insert_q.documents = vec![doc.build()];
        store.insert(&mut conn, &insert_q).await.unwrap();

        let deleted = store.delete(&mut conn, &query(QueryKind::Delete)).await.unwrap();
        assert_eq!(deleted, 1);
        let found = store.find(&mut conn, &query(QueryKind::Find)).await.unwrap();
        assert!(found.is_empty());
    }
}
