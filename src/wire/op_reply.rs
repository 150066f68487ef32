//! OP_REPLY, the legacy reply opcode.

use crate::bson::value::{append_i32, append_i64, read_i32, read_i64, read_raw_document};
use crate::bson::Document;

use super::header::{MessageHeader, HEADER_SIZE};
use super::opcode::OP_REPLY;

#[derive(Debug, Clone)]
pub struct OpReply {
    pub response_flags: i32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl OpReply {
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            response_flags: 0,
            cursor_id: 0,
            starting_from: 0,
            documents,
        }
    }

    pub fn parse(body: &[u8]) -> Option<Self> {
        let (response_flags, rest) = read_i32(body)?;
        let (cursor_id, rest) = read_i64(rest)?;
        let (starting_from, rest) = read_i32(rest)?;
        let (number_returned, mut rest) = read_i32(rest)?;
        let mut documents = Vec::with_capacity(number_returned.max(0) as usize);
        for _ in 0..number_returned.max(0) {
            let (raw, tail) = read_raw_document(rest)?;
            documents.push(Document::validate(raw.to_vec())?);
            rest = tail;
        }
        Some(Self {
            response_flags,
            cursor_id,
            starting_from,
            documents,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + 8 + 4 + 4 + self.documents.iter().map(|d| d.len()).sum::<usize>()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn bytes(&self, request_id: i32, response_to: i32) -> Vec<u8> {
        let hdr = MessageHeader::new(self.size(), request_id, response_to, OP_REPLY);
        let mut dst = hdr.bytes();
        append_i32(&mut dst, self.response_flags);
        append_i64(&mut dst, self.cursor_id);
        append_i32(&mut dst, self.starting_from);
        append_i32(&mut dst, self.documents.len() as i32);
        for doc in &self.documents {
            dst.extend_from_slice(doc.as_bytes());
        }
        dst
    }
}
