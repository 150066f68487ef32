//! OP_KILL_CURSORS, the legacy cursor-teardown opcode.

use crate::bson::value::{append_i32, append_i64, read_i32, read_i64};

use super::header::HEADER_SIZE;

#[derive(Debug, Clone)]
pub struct OpKillCursors {
    pub zero: i32,
    pub cursor_ids: Vec<i64>,
}

impl OpKillCursors {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (zero, rest) = read_i32(body)?;
        let (number_of_cursor_ids, mut rest) = read_i32(rest)?;
        let mut cursor_ids = Vec::with_capacity(number_of_cursor_ids.max(0) as usize);
        for _ in 0..number_of_cursor_ids.max(0) {
            let (id, tail) = read_i64(rest)?;
            cursor_ids.push(id);
            rest = tail;
        }
        Some(Self { zero, cursor_ids })
    }

    pub fn body_size(&self) -> usize {
        4 + 4 + 8 * self.cursor_ids.len()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.zero);
        append_i32(dst, self.cursor_ids.len() as i32);
        for id in &self.cursor_ids {
            append_i64(dst, *id);
        }
    }
}
