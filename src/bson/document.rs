//! Immutable BSON document: a length-prefixed, NUL-terminated byte buffer
//! in BSON 1.1 format, plus an element iterator and convenience accessors.

use super::value::{self, Value};

/// An ordered, length-prefixed sequence of typed elements. Documents are
/// immutable after construction; use [`super::builder::DocumentBuilder`] to
/// produce a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    bytes: Vec<u8>,
}

impl Document {
    /// Wraps `bytes` as a document, validating the length prefix and
    /// terminating NUL (invariant 1, spec §3).
    pub fn validate(bytes: Vec<u8>) -> Option<Document> {
        if bytes.len() < 5 {
            return None;
        }
        let (len, _) = value::read_i32(&bytes)?;
        if len < 5 || len as usize != bytes.len() {
            return None;
        }
        if *bytes.last().unwrap() != 0 {
            return None;
        }
        Some(Document { bytes })
    }

    /// Wraps already-validated bytes (e.g. a slice carved out by
    /// `read_raw_document`, whose length prefix was already checked)
    /// without re-validating. Internal to the codec.
    pub(crate) fn from_validated_bytes(bytes: Vec<u8>) -> Document {
        Document { bytes }
    }

    /// An empty document: `{}`.
    pub fn empty() -> Document {
        Document {
            bytes: vec![5, 0, 0, 0, 0],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty_doc(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Iterates over `(key, value)` pairs in insertion/wire order.
    pub fn iter(&self) -> Elements<'_> {
        Elements {
            // skip the 4-byte length prefix; stop before the trailing NUL.
            rest: &self.bytes[4..self.bytes.len() - 1],
        }
    }

    /// Looks up the first element with the given key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str<'a>(&'a self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.as_i32())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_document(&self, key: &str) -> Option<Document> {
        self.get(key).and_then(|v| match v {
            Value::Document(d) => Some(d),
            _ => None,
        })
    }

    pub fn get_array(&self, key: &str) -> Option<Vec<Value>> {
        self.get(key).and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })
    }

    pub fn get_binary(&self, key: &str) -> Option<(u8, Vec<u8>)> {
        self.get(key).and_then(|v| match v {
            Value::Binary { subtype, data } => Some((subtype, data)),
            _ => None,
        })
    }

    /// The key of the first element, lowercased — used by the command
    /// classifier (spec §4.4 rule 2).
    pub fn first_key_lowercase(&self) -> Option<String> {
        self.iter().next().map(|(k, _)| k.to_lowercase())
    }

    // Used only by `value::append_value_element` when flattening a `Value::Array`
    // into a document-shaped byte buffer; kept here to avoid a public
    // low-level-buffer API leaking out of `bson`.
    pub(crate) fn empty_builder() -> Vec<u8> {
        vec![0, 0, 0, 0] // placeholder length
    }

    pub(crate) fn finish_builder(mut buf: Vec<u8>) -> Document {
        buf.push(0x00);
        let len = buf.len() as i32;
        buf[0..4].copy_from_slice(&len.to_le_bytes());
        Document { bytes: buf }
    }
}

/// Iterator over a document's `(key, Value)` pairs.
pub struct Elements<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Elements<'a> {
    type Item = (String, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let (elem_tag, rest) = value::read_byte(self.rest)?;
        let (key, rest) = value::read_cstring(rest)?;
        let (val, rest) = value::read_value(elem_tag, rest)?;
        self.rest = rest;
        Some((key, val))
    }
}
