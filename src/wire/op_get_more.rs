//! OP_GET_MORE, the legacy cursor-continuation opcode.

use crate::bson::value::{append_cstring, append_i32, append_i64, read_cstring, read_i32, read_i64};

use super::header::HEADER_SIZE;

#[derive(Debug, Clone)]
pub struct OpGetMore {
    pub zero: i32,
    pub full_collection_name: String,
    pub number_to_return: i32,
    pub cursor_id: i64,
}

impl OpGetMore {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (zero, rest) = read_i32(body)?;
        let (full_collection_name, rest) = read_cstring(rest)?;
        let (number_to_return, rest) = read_i32(rest)?;
        let (cursor_id, _) = read_i64(rest)?;
        Some(Self {
            zero,
            full_collection_name,
            number_to_return,
            cursor_id,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + (self.full_collection_name.len() + 1) + 4 + 8
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.zero);
        append_cstring(dst, &self.full_collection_name);
        append_i32(dst, self.number_to_return);
        append_i64(dst, self.cursor_id);
    }
}
