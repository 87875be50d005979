//! BSON encoder
//!
//! Turns a [`Document`] (or any [`BsonShape`]) into BSON bytes:
//!
//! ```text
//! i32 totalLength | (u8 tag, cstring name, payload)* | 0x00
//! ```
//!
//! All integers are little-endian. `totalLength` counts itself and the
//! terminator. Encoding is a pure function of its input.

use super::document::Document;
use super::mapping::{BsonShape, to_document};
use super::path::FieldPath;
use super::value::Bson;
use crate::error::{CodecError, Result, WireError};

/// Encode a document to bytes
pub fn encode_document(doc: &Document) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_document(doc, &FieldPath::Root)?;
    Ok(encoder.into_bytes())
}

/// Encode a host value through its field binding
pub fn to_vec<T: BsonShape>(value: &T) -> Result<Vec<u8>> {
    let doc = to_document(value)?;
    encode_document(&doc)
}

/// Append-only BSON writer
///
/// Several documents may be written back to back, which is how the wire
/// layer concatenates document sequences into a message body.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write one complete length-prefixed document
    pub fn write_document(&mut self, doc: &Document, path: &FieldPath<'_>) -> Result<()> {
        let start = self.begin_length();
        for (name, value) in doc.iter() {
            let child = path.key(name);
            self.write_element(name, value, &child)?;
        }
        self.buf.push(0);
        self.finish_length(start)
    }

    /// Write an array as a document keyed "0", "1", ...
    fn write_array(&mut self, items: &[Bson], path: &FieldPath<'_>) -> Result<()> {
        let start = self.begin_length();
        for (idx, value) in items.iter().enumerate() {
            let key = idx.to_string();
            let child = path.index(idx);
            self.write_element(&key, value, &child)?;
        }
        self.buf.push(0);
        self.finish_length(start)
    }

    fn write_element(&mut self, name: &str, value: &Bson, path: &FieldPath<'_>) -> Result<()> {
        self.buf.push(value.element_type() as u8);
        self.write_cstring(name, path)?;
        self.write_payload(value, path)
    }

    fn write_payload(&mut self, value: &Bson, path: &FieldPath<'_>) -> Result<()> {
        match value {
            Bson::Double(f) => self.buf.extend_from_slice(&f.to_le_bytes()),
            Bson::String(s) | Bson::Code(s) | Bson::Symbol(s) => self.write_string(s)?,
            Bson::Document(doc) => self.write_document(doc, path)?,
            Bson::Array(items) => self.write_array(items, path)?,
            Bson::Binary(bin) => {
                self.write_i32(length_i32(bin.bytes.len())?);
                self.buf.push(bin.subtype);
                self.buf.extend_from_slice(&bin.bytes);
            }
            Bson::Undefined | Bson::Null => {}
            Bson::ObjectId(id) => self.buf.extend_from_slice(&id.bytes()),
            Bson::Boolean(b) => self.buf.push(u8::from(*b)),
            Bson::UtcDateTime(ms) => self.buf.extend_from_slice(&ms.to_le_bytes()),
            Bson::Regex(re) => {
                self.write_cstring(&re.pattern, path)?;
                self.write_cstring(&re.options, path)?;
            }
            Bson::Reference { namespace, id } => {
                self.write_string(namespace)?;
                self.buf.extend_from_slice(&id.bytes());
            }
            Bson::ScopedCode { code, scope } => {
                let start = self.begin_length();
                self.write_string(code)?;
                self.write_document(scope, path)?;
                self.finish_length(start)?;
            }
            Bson::Int32(n) => self.write_i32(*n),
            Bson::Timestamp(ts) => self.buf.extend_from_slice(&ts.to_le_bytes()),
            Bson::Int64(n) => self.buf.extend_from_slice(&n.to_le_bytes()),
        }
        Ok(())
    }

    /// Length-prefixed string: `i32 len(incl NUL) | utf8 | 0x00`
    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_i32(length_i32(s.len() + 1)?);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub(crate) fn write_cstring(&mut self, s: &str, path: &FieldPath<'_>) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(CodecError::FieldName {
                name: s.to_string(),
                path: path.to_string(),
            }
            .into());
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub(crate) fn write_i32(&mut self, n: i32) {
        self.buf.extend_from_slice(&n.to_le_bytes());
    }

    pub(crate) fn write_i64(&mut self, n: i64) {
        self.buf.extend_from_slice(&n.to_le_bytes());
    }

    fn begin_length(&mut self) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        start
    }

    fn finish_length(&mut self, start: usize) -> Result<()> {
        let len = length_i32(self.buf.len() - start)?;
        self.buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

fn length_i32(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        WireError::from(CodecError::InvalidState(format!(
            "length {len} exceeds the 32-bit length prefix"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::{Binary, ObjectId, Regex};
    use crate::bson_doc;

    #[test]
    fn test_empty_document() {
        let bytes = encode_document(&Document::new()).unwrap();
        assert_eq!(bytes, [5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_db_info_layout() {
        let doc = bson_doc! { "Name" => "DBTest", "SizeOnDisk" => 42 };
        let bytes = encode_document(&doc).unwrap();

        let total = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(total as usize, bytes.len());

        assert_eq!(bytes[4], 0x02);
        assert_eq!(&bytes[5..10], b"Name\0");
        assert_eq!(&bytes[10..14], &7i32.to_le_bytes());
        assert_eq!(&bytes[14..21], b"DBTest\0");
        assert_eq!(bytes[21], 0x10);
        assert_eq!(&bytes[22..33], b"SizeOnDisk\0");
        assert_eq!(&bytes[33..37], &42i32.to_le_bytes());
        assert_eq!(bytes[37], 0);
        assert_eq!(bytes.len(), 38);
    }

    #[test]
    fn test_array_keys_are_indices() {
        let doc = bson_doc! { "a" => vec![Bson::Int32(1), Bson::Int32(2)] };
        let bytes = encode_document(&doc).unwrap();
        // outer header, tag, "a\0", then the array document
        let inner = &bytes[7..];
        assert_eq!(inner[4], 0x10);
        assert_eq!(&inner[5..7], b"0\0");
        assert_eq!(inner[11], 0x10);
        assert_eq!(&inner[12..14], b"1\0");
    }

    #[test]
    fn test_nul_in_field_name_is_rejected() {
        let mut inner = Document::new();
        inner.insert("bad\0name", 1);
        let doc = bson_doc! { "outer" => inner };

        let err = encode_document(&doc).unwrap_err();
        match err.as_codec() {
            Some(CodecError::FieldName { name, path }) => {
                assert_eq!(name, "bad\0name");
                assert_eq!(path, "outer.bad\0name");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nul_in_regex_is_rejected() {
        let doc = bson_doc! { "re" => Regex::new("a\0b", "") };
        assert!(matches!(
            encode_document(&doc).unwrap_err().as_codec(),
            Some(CodecError::FieldName { .. })
        ));
    }

    #[test]
    fn test_binary_and_object_id_payloads() {
        let id = ObjectId::from_bytes([1; 12]);
        let doc = bson_doc! {
            "b" => Binary { subtype: 0x80, bytes: vec![9, 8, 7] },
            "i" => id,
        };
        let bytes = encode_document(&doc).unwrap();
        assert_eq!(bytes[4], 0x05);
        assert_eq!(&bytes[7..11], &3i32.to_le_bytes());
        assert_eq!(bytes[11], 0x80);
        assert_eq!(&bytes[12..15], &[9, 8, 7]);
        assert_eq!(bytes[15], 0x07);
        assert_eq!(&bytes[18..30], &[1; 12]);
    }

    #[test]
    fn test_scoped_code_length_covers_code_and_scope() {
        let doc = bson_doc! {
            "f" => Bson::ScopedCode { code: "x".to_string(), scope: bson_doc! { "x" => 1 } },
        };
        let bytes = encode_document(&doc).unwrap();
        let total = i32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        // 4 (total) + 4 + 2 ("x\0") + 12 (scope doc)
        assert_eq!(total, 22);
    }

    #[test]
    fn test_encoder_concatenates_documents() {
        let mut encoder = Encoder::new();
        encoder.write_document(&bson_doc! { "a" => 1 }, &FieldPath::Root).unwrap();
        encoder.write_document(&Document::new(), &FieldPath::Root).unwrap();
        let bytes = encoder.into_bytes();
        assert_eq!(bytes.len(), 12 + 5);
        assert_eq!(&bytes[12..], &[5, 0, 0, 0, 0]);
    }
}
