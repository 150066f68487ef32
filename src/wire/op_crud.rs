//! Legacy write/query opcodes that share the
//! `fullCollectionName` cstring + embedded document(s) shape:
//! OP_UPDATE, OP_INSERT, OP_QUERY, OP_DELETE.

use crate::bson::value::{append_cstring, append_i32, read_cstring, read_i32, read_raw_document, read_u32};
use crate::bson::Document;

use super::header::HEADER_SIZE;

#[derive(Debug, Clone)]
pub struct OpUpdate {
    pub zero: i32,
    pub full_collection_name: String,
    pub flags: u32,
    pub selector: Document,
    pub update: Document,
}

impl OpUpdate {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (zero, rest) = read_i32(body)?;
        let (full_collection_name, rest) = read_cstring(rest)?;
        let (flags, rest) = read_u32(rest)?;
        let (selector_raw, rest) = read_raw_document(rest)?;
        let selector = Document::validate(selector_raw.to_vec())?;
        let (update_raw, _) = read_raw_document(rest)?;
        let update = Document::validate(update_raw.to_vec())?;
        Some(Self {
            zero,
            full_collection_name,
            flags,
            selector,
            update,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + (self.full_collection_name.len() + 1) + 4 + self.selector.len() + self.update.len()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.zero);
        append_cstring(dst, &self.full_collection_name);
        append_i32(dst, self.flags as i32);
        dst.extend_from_slice(self.selector.as_bytes());
        dst.extend_from_slice(self.update.as_bytes());
    }
}

#[derive(Debug, Clone)]
pub struct OpInsert {
    pub flags: u32,
    pub full_collection_name: String,
    pub document: Document,
}

impl OpInsert {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (flags, rest) = read_u32(body)?;
        let (full_collection_name, rest) = read_cstring(rest)?;
        let (document_raw, _) = read_raw_document(rest)?;
        let document = Document::validate(document_raw.to_vec())?;
        Some(Self {
            flags,
            full_collection_name,
            document,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + (self.full_collection_name.len() + 1) + self.document.len()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.flags as i32);
        append_cstring(dst, &self.full_collection_name);
        dst.extend_from_slice(self.document.as_bytes());
    }
}

#[derive(Debug, Clone)]
pub struct OpQuery {
    pub flags: u32,
    pub full_collection_name: String,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Document,
}

impl OpQuery {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (flags, rest) = read_u32(body)?;
        let (full_collection_name, rest) = read_cstring(rest)?;
        let (number_to_skip, rest) = read_i32(rest)?;
        let (number_to_return, rest) = read_i32(rest)?;
        let (query_raw, _) = read_raw_document(rest)?;
        let query = Document::validate(query_raw.to_vec())?;
        Some(Self {
            flags,
            full_collection_name,
            number_to_skip,
            number_to_return,
            query,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + (self.full_collection_name.len() + 1) + 4 + 4 + self.query.len()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.flags as i32);
        append_cstring(dst, &self.full_collection_name);
        append_i32(dst, self.number_to_skip);
        append_i32(dst, self.number_to_return);
        dst.extend_from_slice(self.query.as_bytes());
    }

    /// True when this query targets the admin `$cmd` pseudo-collection.
    pub fn is_admin_command(&self) -> bool {
        self.full_collection_name == "admin.$cmd"
    }
}

#[derive(Debug, Clone)]
pub struct OpDelete {
    pub zero: i32,
    pub full_collection_name: String,
    pub flags: u32,
    pub selector: Document,
}

impl OpDelete {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (zero, rest) = read_i32(body)?;
        let (full_collection_name, rest) = read_cstring(rest)?;
        let (flags, rest) = read_u32(rest)?;
        let (selector_raw, _) = read_raw_document(rest)?;
        let selector = Document::validate(selector_raw.to_vec())?;
        Some(Self {
            zero,
            full_collection_name,
            flags,
            selector,
        })
    }

    pub fn body_size(&self) -> usize {
        4 + (self.full_collection_name.len() + 1) + 4 + self.selector.len()
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_i32(dst, self.zero);
        append_cstring(dst, &self.full_collection_name);
        append_i32(dst, self.flags as i32);
        dst.extend_from_slice(self.selector.as_bytes());
    }
}
