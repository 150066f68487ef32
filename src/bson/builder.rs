//! The "dictionary" document builder: an insertion-ordered accumulator of
//! `(key, Value)` pairs that flushes to a valid BSON document in one pass.
//!
//! Ordered rather than hash-backed, since document field order is
//! observable over the wire.
//!
//! Because [`Value`] is a closed Rust enum, every value a caller can
//! construct is by definition a supported BSON type — there is no
//! "unsupported runtime tag" failure mode to encode here, unlike the Go
//! `interface{}`-based dictionary.

use super::document::Document;
use super::value::{self, Value};

/// Accumulates elements in insertion order, then serializes them as a BSON
/// document: placeholder length, each element, terminating NUL, backpatched
/// length.
#[derive(Debug, Default, Clone)]
pub struct DocumentBuilder {
    elements: Vec<(String, Value)>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.elements.push((key.into(), value.into()));
        self
    }

    pub fn append_f64(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.append(key, Value::Double(value))
    }

    pub fn append_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.append(key, Value::String(value.into()))
    }

    pub fn append_i32(&mut self, key: impl Into<String>, value: i32) -> &mut Self {
        self.append(key, Value::Int32(value))
    }

    pub fn append_i64(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.append(key, Value::Int64(value))
    }

    pub fn append_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.append(key, Value::Boolean(value))
    }

    pub fn append_datetime_millis(&mut self, key: impl Into<String>, value_ms: i64) -> &mut Self {
        self.append(key, Value::DateTime(value_ms))
    }

    pub fn append_null(&mut self, key: impl Into<String>) -> &mut Self {
        self.append(key, Value::Null)
    }

    pub fn append_binary(
        &mut self,
        key: impl Into<String>,
        subtype: u8,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.append(
            key,
            Value::Binary {
                subtype,
                data: data.into(),
            },
        )
    }

    pub fn append_object_id(&mut self, key: impl Into<String>, oid: [u8; 12]) -> &mut Self {
        self.append(key, Value::ObjectId(oid))
    }

    pub fn append_document(&mut self, key: impl Into<String>, value: Document) -> &mut Self {
        self.append(key, Value::Document(value))
    }

    /// Appends an array element, encoded as an embedded document whose keys
    /// are decimal indices starting at "0".
    pub fn append_array(&mut self, key: impl Into<String>, items: Vec<Value>) -> &mut Self {
        self.append(key, Value::Array(items))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Flushes the accumulated elements to a valid BSON document.
    pub fn build(&self) -> Document {
        let mut buf = vec![0u8, 0, 0, 0]; // placeholder length
        for (key, val) in &self.elements {
            value::append_value_element(&mut buf, key, val);
        }
        buf.push(0x00); // terminating NUL
        let len = buf.len() as i32;
        buf[0..4].copy_from_slice(&len.to_le_bytes());
        // `from_validated_bytes` is safe here: we just built exactly one
        // well-formed document by construction.
        Document::from_validated_bytes(buf)
    }
}

/// Convenience macro mirroring the ergonomics of the `bson` crate's `doc!`
/// macro, built on [`DocumentBuilder`]. Supports scalar values, nested
/// `doc!{}` documents, and `[ ... ]` arrays.
#[macro_export]
macro_rules! bson_doc {
    (@array [$($elems:expr),* $(,)?]) => {
        vec![$($crate::bson::Value::from($elems)),*]
    };
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        #[allow(unused_mut)]
        let mut b = $crate::bson::DocumentBuilder::new();
        $( b.append($key, $value); )*
        b.build()
    }};
}
