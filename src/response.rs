//! Response document shapes: thin helpers over
//! [`DocumentBuilder`] for the well-known reply keys drivers expect —
//! `ok`/`n`/`nModified`, cursor batches, and SASL conversation replies.

use crate::bson::{Document, DocumentBuilder, Value};

/// `{ok: 1.0}` — the default success reply, also used verbatim for unknown
/// admin commands.
pub fn ok() -> Document {
    let mut b = DocumentBuilder::new();
    b.append_f64("ok", 1.0);
    b.build()
}

/// `{ok: 0.0, errmsg: "..."}` — a failed command.
pub fn failure(errmsg: impl Into<String>) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_f64("ok", 0.0).append_str("errmsg", errmsg.into());
    b.build()
}

/// `{n: <count>, ok: 1.0}` — insert/delete acknowledgment.
pub fn write_ack(n: i32) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_i32("n", n).append_f64("ok", 1.0);
    b.build()
}

/// `{n: <matched>, nModified: <modified>, ok: 1.0}` — update acknowledgment.
pub fn update_ack(n: i32, n_modified: i32) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_i32("n", n)
        .append_i32("nModified", n_modified)
        .append_f64("ok", 1.0);
    b.build()
}

/// `{n: <count>, ok: 0.0, errmsg}` — a write that partially completed before
/// the executor reported an error.
pub fn write_failure(n: i32, errmsg: impl Into<String>) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_i32("n", n)
        .append_f64("ok", 0.0)
        .append_str("errmsg", errmsg.into());
    b.build()
}

/// `{cursor: {firstBatch: [...], id: 0, ns: "<db>.<collection>"}, ok: 1.0}` —
/// a find reply with the full result set inlined (no server-side cursor
/// persistence — every batch is returned in one reply).
pub fn cursor_reply(documents: Vec<Document>, namespace: &str) -> Document {
    let mut cursor = DocumentBuilder::new();
    let batch: Vec<Value> = documents.into_iter().map(Value::Document).collect();
    cursor
        .append_array("firstBatch", batch)
        .append_i64("id", 0)
        .append_str("ns", namespace);
    let mut b = DocumentBuilder::new();
    b.append_document("cursor", cursor.build()).append_f64("ok", 1.0);
    b.build()
}

/// `{conversationId, payload, done, ok: 1.0}` — a SASL step reply.
pub fn sasl_reply(conversation_id: i32, payload: &[u8], done: bool) -> Document {
    let mut b = DocumentBuilder::new();
    b.append_i32("conversationId", conversation_id)
        .append_binary("payload", 0, payload.to_vec())
        .append_bool("done", done)
        .append_f64("ok", 1.0);
    b.build()
}

/// A not-yet-implemented opcode/command.
pub fn not_implemented(what: &str) -> Document {
    failure(format!("{what} is not implemented"))
}

/// `{cursorsUnknown: [], ok: 1.0}`-shaped success for OP_KILL_CURSORS —
/// always a success reply, since no server-side cursor is ever tracked.
pub fn kill_cursors_ack() -> Document {
    ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_double_one() {
        assert_eq!(ok().get_f64("ok"), Some(1.0));
    }

    #[test]
    fn failure_carries_errmsg() {
        let doc = failure("boom");
        assert_eq!(doc.get_f64("ok"), Some(0.0));
        assert_eq!(doc.get_str("errmsg"), Some("boom".to_string()));
    }

    #[test]
    fn cursor_reply_shape() {
        let mut d = DocumentBuilder::new();
        d.append_i32("_id", 1);
        let doc = cursor_reply(vec![d.build()], "test.trainers");
        let cursor = doc.get_document("cursor").unwrap();
        assert_eq!(cursor.get("id").unwrap().as_i64(), Some(0));
        assert_eq!(cursor.get_str("ns"), Some("test.trainers".to_string()));
        let batch = cursor.get_array("firstBatch").unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn sasl_reply_shape() {
        let doc = sasl_reply(7, b"abc", false);
        assert_eq!(doc.get_i32("conversationId"), Some(7));
        assert_eq!(doc.get_bool("done"), Some(false));
        let (subtype, data) = doc.get_binary("payload").unwrap();
        assert_eq!(subtype, 0);
        assert_eq!(data, b"abc");
    }
}
