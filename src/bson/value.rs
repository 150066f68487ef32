//! Tagged BSON value type plus the raw append/read primitives used by
//! [`super::builder::DocumentBuilder`] and [`super::document::Document`].
//! Each `append_*` writes one element in place; each `read_*` returns the
//! decoded value plus the remaining unconsumed slice.

use super::document::Document;

/// BSON element type tags (BSON Specification Version 1.1).
pub mod tag {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const DATETIME: u8 = 0x09;
    pub const NULL: u8 = 0x0A;
    pub const INT32: u8 = 0x10;
    pub const INT64: u8 = 0x12;
}

/// A single BSON-typed value. Owns its data; embedded documents and arrays
/// are themselves [`Document`]s (arrays are documents keyed "0", "1", ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, data: Vec<u8> },
    ObjectId([u8; 12]),
    Boolean(bool),
    /// UTC datetime, milliseconds since the Unix epoch.
    DateTime(i64),
    Null,
    Int32(i32),
    Int64(i64),
}

impl Value {
    /// The BSON element type tag for this value.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Double(_) => tag::DOUBLE,
            Value::String(_) => tag::STRING,
            Value::Document(_) => tag::DOCUMENT,
            Value::Array(_) => tag::ARRAY,
            Value::Binary { .. } => tag::BINARY,
            Value::ObjectId(_) => tag::OBJECT_ID,
            Value::Boolean(_) => tag::BOOLEAN,
            Value::DateTime(_) => tag::DATETIME,
            Value::Null => tag::NULL,
            Value::Int32(_) => tag::INT32,
            Value::Int64(_) => tag::INT64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            Value::Int64(n) => i32::try_from(*n).ok(),
            Value::Double(d) => Some(*d as i32),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            Value::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<(u8, &[u8])> {
        match self {
            Value::Binary { subtype, data } => Some((*subtype, data.as_slice())),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

// --- raw append primitives -------------------------------------------------

pub fn append_i32(dst: &mut Vec<u8>, value: i32) {
    dst.extend_from_slice(&value.to_le_bytes());
}

pub fn append_u32(dst: &mut Vec<u8>, value: u32) {
    dst.extend_from_slice(&value.to_le_bytes());
}

pub fn append_i64(dst: &mut Vec<u8>, value: i64) {
    dst.extend_from_slice(&value.to_le_bytes());
}

pub fn append_f64(dst: &mut Vec<u8>, value: f64) {
    dst.extend_from_slice(&value.to_le_bytes());
}

pub fn append_cstring(dst: &mut Vec<u8>, value: &str) {
    dst.extend_from_slice(value.as_bytes());
    dst.push(0x00);
}

/// Appends a length-prefixed BSON string (length includes the trailing NUL).
pub fn append_bson_string(dst: &mut Vec<u8>, value: &str) {
    let len = value.len() as i32 + 1;
    append_i32(dst, len);
    dst.extend_from_slice(value.as_bytes());
    dst.push(0x00);
}

/// Appends the tag byte and key cstring shared by every element.
fn append_element_header(dst: &mut Vec<u8>, elem_tag: u8, key: &str) {
    dst.push(elem_tag);
    append_cstring(dst, key);
}

pub fn append_double_element(dst: &mut Vec<u8>, key: &str, value: f64) {
    append_element_header(dst, tag::DOUBLE, key);
    append_f64(dst, value);
}

pub fn append_string_element(dst: &mut Vec<u8>, key: &str, value: &str) {
    append_element_header(dst, tag::STRING, key);
    append_bson_string(dst, value);
}

pub fn append_document_element(dst: &mut Vec<u8>, key: &str, value: &Document) {
    append_element_header(dst, tag::DOCUMENT, key);
    dst.extend_from_slice(value.as_bytes());
}

pub fn append_array_element(dst: &mut Vec<u8>, key: &str, value: &Document) {
    append_element_header(dst, tag::ARRAY, key);
    dst.extend_from_slice(value.as_bytes());
}

pub fn append_binary_element(dst: &mut Vec<u8>, key: &str, subtype: u8, data: &[u8]) {
    append_element_header(dst, tag::BINARY, key);
    append_i32(dst, data.len() as i32);
    dst.push(subtype);
    dst.extend_from_slice(data);
}

pub fn append_object_id_element(dst: &mut Vec<u8>, key: &str, value: &[u8; 12]) {
    append_element_header(dst, tag::OBJECT_ID, key);
    dst.extend_from_slice(value);
}

pub fn append_boolean_element(dst: &mut Vec<u8>, key: &str, value: bool) {
    append_element_header(dst, tag::BOOLEAN, key);
    dst.push(if value { 1 } else { 0 });
}

pub fn append_datetime_element(dst: &mut Vec<u8>, key: &str, value_ms: i64) {
    append_element_header(dst, tag::DATETIME, key);
    append_i64(dst, value_ms);
}

pub fn append_null_element(dst: &mut Vec<u8>, key: &str) {
    append_element_header(dst, tag::NULL, key);
}

pub fn append_int32_element(dst: &mut Vec<u8>, key: &str, value: i32) {
    append_element_header(dst, tag::INT32, key);
    append_i32(dst, value);
}

pub fn append_int64_element(dst: &mut Vec<u8>, key: &str, value: i64) {
    append_element_header(dst, tag::INT64, key);
    append_i64(dst, value);
}

/// Appends an already-tagged value (used by the builder and by array
/// encoding, where the value's own tag drives the dispatch).
pub fn append_value_element(dst: &mut Vec<u8>, key: &str, value: &Value) {
    match value {
        Value::Double(v) => append_double_element(dst, key, *v),
        Value::String(v) => append_string_element(dst, key, v),
        Value::Document(v) => append_document_element(dst, key, v),
        Value::Array(items) => {
            let mut arr = Document::empty_builder();
            for (i, item) in items.iter().enumerate() {
                append_value_element(&mut arr, &i.to_string(), item);
            }
            let doc = Document::finish_builder(arr);
            append_array_element(dst, key, &doc);
        }
        Value::Binary { subtype, data } => append_binary_element(dst, key, *subtype, data),
        Value::ObjectId(v) => append_object_id_element(dst, key, v),
        Value::Boolean(v) => append_boolean_element(dst, key, *v),
        Value::DateTime(v) => append_datetime_element(dst, key, *v),
        Value::Null => append_null_element(dst, key),
        Value::Int32(v) => append_int32_element(dst, key, *v),
        Value::Int64(v) => append_int64_element(dst, key, *v),
    }
}

// --- raw read primitives ---------------------------------------------------
// Each returns `(value, remainder)`; `None` signals truncated/malformed
// input. Readers never panic.

pub fn read_i32(buf: &[u8]) -> Option<(i32, &[u8])> {
    if buf.len() < 4 {
        return None;
    }
    let (head, tail) = buf.split_at(4);
    Some((i32::from_le_bytes(head.try_into().ok()?), tail))
}

pub fn read_u32(buf: &[u8]) -> Option<(u32, &[u8])> {
    if buf.len() < 4 {
        return None;
    }
    let (head, tail) = buf.split_at(4);
    Some((u32::from_le_bytes(head.try_into().ok()?), tail))
}

pub fn read_i64(buf: &[u8]) -> Option<(i64, &[u8])> {
    if buf.len() < 8 {
        return None;
    }
    let (head, tail) = buf.split_at(8);
    Some((i64::from_le_bytes(head.try_into().ok()?), tail))
}

pub fn read_f64(buf: &[u8]) -> Option<(f64, &[u8])> {
    if buf.len() < 8 {
        return None;
    }
    let (head, tail) = buf.split_at(8);
    Some((f64::from_le_bytes(head.try_into().ok()?), tail))
}

pub fn read_byte(buf: &[u8]) -> Option<(u8, &[u8])> {
    let (&b, tail) = buf.split_first()?;
    Some((b, tail))
}

pub fn read_cstring(buf: &[u8]) -> Option<(String, &[u8])> {
    let nul = buf.iter().position(|&b| b == 0)?;
    let s = std::str::from_utf8(&buf[..nul]).ok()?.to_string();
    Some((s, &buf[nul + 1..]))
}

/// Reads a length-prefixed BSON string (length includes the trailing NUL).
pub fn read_bson_string(buf: &[u8]) -> Option<(String, &[u8])> {
    let (len, rest) = read_i32(buf)?;
    if len < 1 {
        return None;
    }
    let len = len as usize;
    if rest.len() < len {
        return None;
    }
    let (body, tail) = rest.split_at(len);
    if body.last() != Some(&0) {
        return None;
    }
    let s = std::str::from_utf8(&body[..len - 1]).ok()?.to_string();
    Some((s, tail))
}

/// Reads an embedded document by its self-described length prefix, without
/// fully validating nested elements (validation is a separate pass).
pub fn read_raw_document(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, _) = read_i32(buf)?;
    if len < 5 {
        return None;
    }
    let len = len as usize;
    if buf.len() < len {
        return None;
    }
    Some(buf.split_at(len))
}

pub fn read_binary(buf: &[u8]) -> Option<((u8, &[u8]), &[u8])> {
    let (len, rest) = read_i32(buf)?;
    if len < 0 {
        return None;
    }
    let len = len as usize;
    let (subtype, rest) = read_byte(rest)?;
    if rest.len() < len {
        return None;
    }
    let (data, tail) = rest.split_at(len);
    Some(((subtype, data), tail))
}

pub fn read_object_id(buf: &[u8]) -> Option<([u8; 12], &[u8])> {
    if buf.len() < 12 {
        return None;
    }
    let (head, tail) = buf.split_at(12);
    let mut oid = [0u8; 12];
    oid.copy_from_slice(head);
    Some((oid, tail))
}

pub fn read_boolean(buf: &[u8]) -> Option<(bool, &[u8])> {
    let (b, tail) = read_byte(buf)?;
    Some((b != 0, tail))
}

/// Reads one tagged element's value given its type tag, returning the
/// decoded [`Value`] and the remaining bytes.
pub fn read_value(elem_tag: u8, buf: &[u8]) -> Option<(Value, &[u8])> {
    match elem_tag {
        tag::DOUBLE => read_f64(buf).map(|(v, r)| (Value::Double(v), r)),
        tag::STRING => read_bson_string(buf).map(|(v, r)| (Value::String(v), r)),
        tag::DOCUMENT => {
            let (raw, r) = read_raw_document(buf)?;
            Some((Value::Document(Document::from_validated_bytes(raw.to_vec())), r))
        }
        tag::ARRAY => {
            let (raw, r) = read_raw_document(buf)?;
            let arr_doc = Document::from_validated_bytes(raw.to_vec());
            let mut items = Vec::new();
            for (_, v) in arr_doc.iter() {
                items.push(v);
            }
            Some((Value::Array(items), r))
        }
        tag::BINARY => read_binary(buf).map(|((subtype, data), r)| {
            (
                Value::Binary {
                    subtype,
                    data: data.to_vec(),
                },
                r,
            )
        }),
        tag::OBJECT_ID => read_object_id(buf).map(|(v, r)| (Value::ObjectId(v), r)),
        tag::BOOLEAN => read_boolean(buf).map(|(v, r)| (Value::Boolean(v), r)),
        tag::DATETIME => read_i64(buf).map(|(v, r)| (Value::DateTime(v), r)),
        tag::NULL => Some((Value::Null, buf)),
        tag::INT32 => read_i32(buf).map(|(v, r)| (Value::Int32(v), r)),
        tag::INT64 => read_i64(buf).map(|(v, r)| (Value::Int64(v), r)),
        _ => None,
    }
}
