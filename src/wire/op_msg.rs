//! OP_MSG. Section type 0 carries the body document; section
//! type 1 carries a length-prefixed block of a C-string identifier followed
//! by a document sequence.

use crate::bson::value::{append_cstring, append_i32, append_u32, read_byte, read_cstring, read_raw_document, read_u32};
use crate::bson::Document;

use super::header::HEADER_SIZE;

pub const FLAG_CHECKSUM_PRESENT: u32 = 0x01;
pub const FLAG_MORE_TO_COME: u32 = 0x02;
pub const FLAG_EXHAUST_ALLOWED: u32 = 0xF0;

const SECTION_BODY: u8 = 0;
const SECTION_DOCUMENT_SEQUENCE: u8 = 1;

/// A named document sequence from a type-1 section.
#[derive(Debug, Clone)]
pub struct DocumentSequence {
    pub identifier: String,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone)]
pub struct OpMsg {
    pub flag_bits: u32,
    pub body: Option<Document>,
    pub sequences: Vec<DocumentSequence>,
    /// Present only when `FLAG_CHECKSUM_PRESENT` is set.
    pub checksum: Option<u32>,
}

impl OpMsg {
    pub fn with_body(body: Document) -> Self {
        Self {
            flag_bits: 0,
            body: Some(body),
            sequences: Vec::new(),
            checksum: None,
        }
    }

    /// All document sequences flattened, matching the `documents`/`updates`/
    /// `deletes` accumulation the classifier needs.
    pub fn sequence_named(&self, name: &str) -> Option<&[Document]> {
        self.sequences
            .iter()
            .find(|s| s.identifier == name)
            .map(|s| s.documents.as_slice())
    }

    pub fn parse(body: &[u8]) -> Option<Self> {
        let (flag_bits, mut rest) = read_u32(body)?;
        let mut doc_body = None;
        let mut sequences = Vec::new();

        // The trailing checksum (if present) is not part of the section
        // loop; stop four bytes early so we don't try to parse it as a
        // section type byte.
        let checksum_present = flag_bits & FLAG_CHECKSUM_PRESENT != 0;
        let sections_len = if checksum_present {
            rest.len().checked_sub(4)?
        } else {
            rest.len()
        };
        let mut sections = &rest[..sections_len];
        let trailer = &rest[sections_len..];

        while !sections.is_empty() {
            let (kind, after_kind) = read_byte(sections)?;
            match kind {
                SECTION_BODY => {
                    let (raw, after_doc) = read_raw_document(after_kind)?;
                    doc_body = Some(Document::validate(raw.to_vec())?);
                    sections = after_doc;
                }
                SECTION_DOCUMENT_SEQUENCE => {
                    let (seq_size, after_size) = crate::bson::value::read_i32(after_kind)?;
                    if seq_size < 4 {
                        return None;
                    }
                    let seq_total = seq_size as usize;
                    if after_kind.len() < seq_total {
                        return None;
                    }
                    let (seq_bytes, after_seq) = after_kind.split_at(seq_total);
                    let (identifier, mut doc_bytes) = read_cstring(&seq_bytes[4..])?;
                    let mut documents = Vec::new();
                    while !doc_bytes.is_empty() {
                        let (raw, tail) = read_raw_document(doc_bytes)?;
                        documents.push(Document::validate(raw.to_vec())?);
                        doc_bytes = tail;
                    }
                    sequences.push(DocumentSequence {
                        identifier,
                        documents,
                    });
                    sections = after_seq;
                    let _ = after_size;
                }
                _ => return None,
            }
        }

        let checksum = if checksum_present {
            let (c, _) = read_u32(trailer)?;
            Some(c)
        } else {
            None
        };
        rest = trailer;
        let _ = rest;

        Some(Self {
            flag_bits,
            body: doc_body,
            sequences,
            checksum,
        })
    }

    pub fn body_size(&self) -> usize {
        let mut n = 4; // flag bits
        if let Some(b) = &self.body {
            n += 1 + b.len();
        }
        for seq in &self.sequences {
            let seq_len = 4 + seq.identifier.len() + 1 + seq.documents.iter().map(|d| d.len()).sum::<usize>();
            n += 1 + seq_len;
        }
        if self.flag_bits & FLAG_CHECKSUM_PRESENT != 0 {
            n += 4;
        }
        n
    }

    pub fn size(&self) -> i32 {
        (HEADER_SIZE + self.body_size()) as i32
    }

    pub fn append_body(&self, dst: &mut Vec<u8>) {
        append_u32(dst, self.flag_bits);
        if let Some(b) = &self.body {
            dst.push(SECTION_BODY);
            dst.extend_from_slice(b.as_bytes());
        }
        for seq in &self.sequences {
            dst.push(SECTION_DOCUMENT_SEQUENCE);
            let seq_len = 4 + seq.identifier.len() + 1
                + seq.documents.iter().map(|d| d.len()).sum::<usize>();
            append_i32(dst, seq_len as i32);
            append_cstring(dst, &seq.identifier);
            for doc in &seq.documents {
                dst.extend_from_slice(doc.as_bytes());
            }
        }
        if self.flag_bits & FLAG_CHECKSUM_PRESENT != 0 {
            let checksum = crc32c(&dst[HEADER_SIZE..]);
            append_u32(dst, checksum);
        }
    }
}

/// CRC-32C (Castagnoli) over `data`, used for OP_MSG's optional trailing
/// checksum. Computed on send only when the caller sets
/// `FLAG_CHECKSUM_PRESENT`; never required on receive.
pub fn crc32c(data: &[u8]) -> u32 {
    const POLY: u32 = 0x82F6_3B78;
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::DocumentBuilder;

    #[test]
    fn roundtrips_body_only() {
        let mut b = DocumentBuilder::new();
        b.append_f64("ok", 1.0);
        let msg = OpMsg::with_body(b.build());
        let mut bytes = vec![0u8; HEADER_SIZE];
        msg.append_body(&mut bytes);
        let parsed = OpMsg::parse(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(parsed.body.unwrap().get_f64("ok"), Some(1.0));
    }

    #[test]
    fn roundtrips_document_sequence() {
        let mut b = DocumentBuilder::new();
        b.append_str("insert", "trainers");
        let mut one = DocumentBuilder::new();
        one.append_i32("_id", 1);
        let msg = OpMsg {
            flag_bits: 0,
            body: Some(b.build()),
            sequences: vec![DocumentSequence {
                identifier: "documents".to_string(),
                documents: vec![one.build()],
            }],
            checksum: None,
        };
        let mut bytes = vec![0u8; HEADER_SIZE];
        msg.append_body(&mut bytes);
        let parsed = OpMsg::parse(&bytes[HEADER_SIZE..]).unwrap();
        let docs = parsed.sequence_named("documents").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_i32("_id"), Some(1));
    }

    #[test]
    fn checksum_flag_roundtrips() {
        let mut b = DocumentBuilder::new();
        b.append_f64("ok", 1.0);
        let msg = OpMsg {
            flag_bits: FLAG_CHECKSUM_PRESENT,
            body: Some(b.build()),
            sequences: Vec::new(),
            checksum: None,
        };
        let mut bytes = vec![0u8; HEADER_SIZE];
        msg.append_body(&mut bytes);
        let parsed = OpMsg::parse(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(parsed.flag_bits & FLAG_CHECKSUM_PRESENT, FLAG_CHECKSUM_PRESENT);
        assert!(parsed.checksum.is_some());
    }
}
