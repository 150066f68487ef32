//! The `Message` enum: one variant per supported opcode, each carrying the
//! header plus its opcode-specific fields.

use crate::bson::Document;
use crate::error::{Error, Result};

use super::header::{MessageHeader, HEADER_SIZE};
use super::op_crud::{OpDelete, OpInsert, OpQuery, OpUpdate};
use super::op_get_more::OpGetMore;
use super::op_kill_cursors::OpKillCursors;
use super::op_msg::OpMsg;
use super::op_reply::OpReply;
use super::opcode;

#[derive(Debug, Clone)]
pub enum Message {
    Reply(OpReply),
    Update(OpUpdate),
    Insert(OpInsert),
    Query(OpQuery),
    GetMore(OpGetMore),
    Delete(OpDelete),
    KillCursors(OpKillCursors),
    Msg(OpMsg),
}

impl Message {
    pub fn op_code(&self) -> i32 {
        match self {
            Message::Reply(_) => opcode::OP_REPLY,
            Message::Update(_) => opcode::OP_UPDATE,
            Message::Insert(_) => opcode::OP_INSERT,
            Message::Query(_) => opcode::OP_QUERY,
            Message::GetMore(_) => opcode::OP_GET_MORE,
            Message::Delete(_) => opcode::OP_DELETE,
            Message::KillCursors(_) => opcode::OP_KILL_CURSORS,
            Message::Msg(_) => opcode::OP_MSG,
        }
    }

    /// Parses the opcode-specific body given an already-parsed header.
    pub fn parse(header: &MessageHeader, body: &[u8]) -> Result<Message> {
        let unparseable = || Error::Decode(format!("malformed body for opcode {}", header.op_code));
        match header.op_code {
            opcode::OP_REPLY => OpReply::parse(body).map(Message::Reply).ok_or_else(unparseable),
            opcode::OP_UPDATE => OpUpdate::parse(body).map(Message::Update).ok_or_else(unparseable),
            opcode::OP_INSERT => OpInsert::parse(body).map(Message::Insert).ok_or_else(unparseable),
            opcode::OP_QUERY => OpQuery::parse(body).map(Message::Query).ok_or_else(unparseable),
            opcode::OP_GET_MORE => OpGetMore::parse(body).map(Message::GetMore).ok_or_else(unparseable),
            opcode::OP_DELETE => OpDelete::parse(body).map(Message::Delete).ok_or_else(unparseable),
            opcode::OP_KILL_CURSORS => OpKillCursors::parse(body).map(Message::KillCursors).ok_or_else(unparseable),
            opcode::OP_MSG => OpMsg::parse(body).map(Message::Msg).ok_or_else(unparseable),
            other => Err(Error::Framing(format!("unrecognized opcode {other}"))),
        }
    }

    pub fn size(&self) -> i32 {
        match self {
            Message::Reply(m) => m.size(),
            Message::Update(m) => m.size(),
            Message::Insert(m) => m.size(),
            Message::Query(m) => m.size(),
            Message::GetMore(m) => m.size(),
            Message::Delete(m) => m.size(),
            Message::KillCursors(m) => m.size(),
            Message::Msg(m) => m.size(),
        }
    }

    /// Serializes the full wire message: header followed by body.
    pub fn bytes(&self, request_id: i32, response_to: i32) -> Vec<u8> {
        if let Message::Reply(m) = self {
            return m.bytes(request_id, response_to);
        }
        let header = MessageHeader::new(self.size(), request_id, response_to, self.op_code());
        let mut dst = header.bytes();
        match self {
            Message::Reply(_) => unreachable!("handled above"),
            Message::Update(m) => m.append_body(&mut dst),
            Message::Insert(m) => m.append_body(&mut dst),
            Message::Query(m) => m.append_body(&mut dst),
            Message::GetMore(m) => m.append_body(&mut dst),
            Message::Delete(m) => m.append_body(&mut dst),
            Message::KillCursors(m) => m.append_body(&mut dst),
            Message::Msg(m) => m.append_body(&mut dst),
        }
        dst
    }

    /// The primary BSON document carried by this message, used by the
    /// command/query classifier. `None` for opcodes with no
    /// single governing document (e.g. OP_GET_MORE, OP_KILL_CURSORS).
    pub fn primary_document(&self) -> Option<&Document> {
        match self {
            Message::Query(m) => Some(&m.query),
            Message::Msg(m) => m.body.as_ref(),
            Message::Insert(m) => Some(&m.document),
            Message::Update(m) => Some(&m.update),
            Message::Delete(m) => Some(&m.selector),
            Message::Reply(m) => m.documents.first(),
            _ => None,
        }
    }
}

pub const HEADER_LEN: usize = HEADER_SIZE;
