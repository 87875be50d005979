//! BSON decoder
//!
//! Turns BSON bytes back into a [`Document`] (or any [`BsonShape`]). Every
//! nested length is checked against its enclosing document, string payloads
//! are checked for their NUL terminator and UTF-8 validity, and unknown type
//! tags are rejected rather than skipped.

use super::document::Document;
use super::mapping::{BsonShape, from_document};
use super::oid::ObjectId;
use super::path::FieldPath;
use super::value::{Binary, Bson, ElementType, Regex};
use crate::error::{CodecError, Result};

const MIN_DOCUMENT_LEN: usize = 5;

/// Decode a buffer holding exactly one document
///
/// # Returns
/// * `TruncatedDocument` if the buffer is shorter than the length prefix
/// * `TrailingData` if it is longer
pub fn decode_document(bytes: &[u8]) -> Result<Document> {
    let declared = declared_length(bytes, 0)?;
    if declared > bytes.len() {
        return Err(CodecError::TruncatedDocument {
            offset: 0,
            declared,
            available: bytes.len(),
        }
        .into());
    }
    if declared < bytes.len() {
        return Err(CodecError::TrailingData {
            declared,
            actual: bytes.len(),
        }
        .into());
    }
    let mut reader = Reader::new(bytes);
    reader.read_document(&FieldPath::Root)
}

/// Decode the document at the front of `bytes`
///
/// # Returns
/// * `(Document, usize)` - The document and the number of bytes it occupied
pub fn decode_document_prefix(bytes: &[u8]) -> Result<(Document, usize)> {
    let declared = declared_length(bytes, 0)?;
    if declared > bytes.len() {
        return Err(CodecError::TruncatedDocument {
            offset: 0,
            declared,
            available: bytes.len(),
        }
        .into());
    }
    let mut reader = Reader::new(&bytes[..declared]);
    let doc = reader.read_document(&FieldPath::Root)?;
    Ok((doc, declared))
}

/// Decode bytes into a host value through its field binding
pub fn from_slice<T: BsonShape>(bytes: &[u8]) -> Result<T> {
    let doc = decode_document(bytes)?;
    from_document(doc)
}

fn declared_length(bytes: &[u8], offset: usize) -> Result<usize> {
    let Some(raw) = bytes.get(offset..offset + 4) else {
        return Err(CodecError::TruncatedDocument {
            offset,
            declared: MIN_DOCUMENT_LEN,
            available: bytes.len().saturating_sub(offset),
        }
        .into());
    };
    let len = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if len < MIN_DOCUMENT_LEN as i32 {
        return Err(CodecError::Malformed {
            offset,
            reason: format!("document length {len} is below the minimum of {MIN_DOCUMENT_LEN}"),
        }
        .into());
    }
    Ok(len as usize)
}

/// Bounded cursor over a BSON buffer
///
/// Offsets in errors are absolute positions in the buffer handed to
/// [`Reader::new`].
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    fn read_document(&mut self, path: &FieldPath<'_>) -> Result<Document> {
        let mut doc = Document::new();
        self.read_elements(path, false, |name, value, offset| {
            if doc.insert(name.clone(), value).is_some() {
                return Err(CodecError::DuplicateField { name, offset }.into());
            }
            Ok(())
        })?;
        Ok(doc)
    }

    /// Array elements are taken in stream order; their keys are not interpreted
    fn read_array(&mut self, path: &FieldPath<'_>) -> Result<Vec<Bson>> {
        let mut items = Vec::new();
        self.read_elements(path, true, |_, value, _| {
            items.push(value);
            Ok(())
        })?;
        Ok(items)
    }

    fn read_elements<F>(&mut self, path: &FieldPath<'_>, is_array: bool, mut sink: F) -> Result<()>
    where
        F: FnMut(String, Bson, usize) -> Result<()>,
    {
        let start = self.pos;
        let declared = declared_length(self.buf, start)?;
        let doc_end = start + declared;
        if doc_end > self.end {
            return Err(CodecError::TruncatedDocument {
                offset: start,
                declared,
                available: self.end - start,
            }
            .into());
        }

        let outer_end = self.end;
        self.end = doc_end;
        self.pos = start + 4;

        let mut index = 0usize;
        loop {
            let tag_offset = self.pos;
            let tag = self.read_u8()?;
            if tag == 0 {
                break;
            }
            let name = self.read_cstring()?;
            // array keys are positional; report the index instead
            let child = if is_array {
                path.index(index)
            } else {
                path.key(&name)
            };
            let Some(kind) = ElementType::from_u8(tag) else {
                return Err(CodecError::UnknownTypeTag {
                    tag,
                    offset: tag_offset,
                    path: child.to_string(),
                }
                .into());
            };
            let value = self.read_value(kind, &child)?;
            sink(name, value, tag_offset)?;
            index += 1;
        }

        if self.pos != doc_end {
            return Err(CodecError::Malformed {
                offset: self.pos - 1,
                reason: format!(
                    "terminator found {} bytes before the declared end",
                    doc_end - self.pos
                ),
            }
            .into());
        }
        self.end = outer_end;
        Ok(())
    }

    fn read_value(&mut self, kind: ElementType, path: &FieldPath<'_>) -> Result<Bson> {
        let value = match kind {
            ElementType::Double => Bson::Double(f64::from_le_bytes(self.read_array_n::<8>()?)),
            ElementType::String => Bson::String(self.read_string()?),
            ElementType::Document => Bson::Document(self.read_document(path)?),
            ElementType::Array => Bson::Array(self.read_array(path)?),
            ElementType::Binary => {
                let offset = self.pos;
                let len = self.read_i32()?;
                let len = usize::try_from(len).map_err(|_| CodecError::Malformed {
                    offset,
                    reason: format!("negative binary length {len}"),
                })?;
                let subtype = self.read_u8()?;
                let bytes = self.take(len)?.to_vec();
                Bson::Binary(Binary { subtype, bytes })
            }
            ElementType::Undefined => Bson::Undefined,
            ElementType::ObjectId => Bson::ObjectId(ObjectId::from_bytes(self.read_array_n::<12>()?)),
            ElementType::Boolean => {
                let offset = self.pos;
                match self.read_u8()? {
                    0 => Bson::Boolean(false),
                    1 => Bson::Boolean(true),
                    other => {
                        return Err(CodecError::Malformed {
                            offset,
                            reason: format!("boolean byte 0x{other:02x}"),
                        }
                        .into());
                    }
                }
            }
            ElementType::UtcDateTime => Bson::UtcDateTime(self.read_i64()?),
            ElementType::Null => Bson::Null,
            ElementType::Regex => {
                let pattern = self.read_cstring()?;
                let options = self.read_cstring()?;
                Bson::Regex(Regex { pattern, options })
            }
            ElementType::Reference => {
                let namespace = self.read_string()?;
                let id = ObjectId::from_bytes(self.read_array_n::<12>()?);
                Bson::Reference { namespace, id }
            }
            ElementType::Code => Bson::Code(self.read_string()?),
            ElementType::Symbol => Bson::Symbol(self.read_string()?),
            ElementType::ScopedCode => {
                let start = self.pos;
                let total = self.read_i32()?;
                let code = self.read_string()?;
                let scope = self.read_document(path)?;
                if i64::from(total) != (self.pos - start) as i64 {
                    return Err(CodecError::Malformed {
                        offset: start,
                        reason: format!(
                            "scoped code declares {total} bytes but spans {}",
                            self.pos - start
                        ),
                    }
                    .into());
                }
                Bson::ScopedCode { code, scope }
            }
            ElementType::Int32 => Bson::Int32(self.read_i32()?),
            ElementType::Timestamp => Bson::Timestamp(u64::from_le_bytes(self.read_array_n::<8>()?)),
            ElementType::Int64 => Bson::Int64(self.read_i64()?),
        };
        Ok(value)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.end - self.pos;
        if n > remaining {
            return Err(CodecError::Malformed {
                offset: self.pos,
                reason: format!("value needs {n} bytes but only {remaining} remain"),
            }
            .into());
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array_n<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array_n::<4>()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array_n::<8>()?))
    }

    /// NUL-terminated UTF-8
    fn read_cstring(&mut self) -> Result<String> {
        let start = self.pos;
        let window = &self.buf[start..self.end];
        let Some(nul) = window.iter().position(|&b| b == 0) else {
            return Err(CodecError::Malformed {
                offset: start,
                reason: "unterminated cstring".to_string(),
            }
            .into());
        };
        let text = std::str::from_utf8(&window[..nul])
            .map_err(|_| CodecError::InvalidUtf8 { offset: start })?
            .to_string();
        self.pos = start + nul + 1;
        Ok(text)
    }

    /// `i32 len | utf8 | 0x00`, where len includes the terminator
    fn read_string(&mut self) -> Result<String> {
        let offset = self.pos;
        let len = self.read_i32()?;
        if len < 1 {
            return Err(CodecError::Malformed {
                offset,
                reason: format!("string length {len} must be at least 1"),
            }
            .into());
        }
        let raw = self.take(len as usize)?;
        let (body, terminator) = raw.split_at(raw.len() - 1);
        if terminator != [0] {
            return Err(CodecError::Malformed {
                offset,
                reason: "string is not NUL-terminated".to_string(),
            }
            .into());
        }
        let text = std::str::from_utf8(body).map_err(|_| CodecError::InvalidUtf8 { offset: offset + 4 })?;
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::encoder::encode_document;
    use crate::bson_doc;

    fn err_of(bytes: &[u8]) -> CodecError {
        decode_document(bytes)
            .unwrap_err()
            .as_codec()
            .cloned()
            .expect("codec error")
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(decode_document(&[5, 0, 0, 0, 0]).unwrap(), Document::new());
    }

    #[test]
    fn test_truncated_buffer() {
        let bytes = encode_document(&bson_doc! { "a" => 1 }).unwrap();
        match err_of(&bytes[..bytes.len() - 2]) {
            CodecError::TruncatedDocument {
                declared,
                available,
                ..
            } => {
                assert_eq!(declared, bytes.len());
                assert_eq!(available, bytes.len() - 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(err_of(&[5, 0]), CodecError::TruncatedDocument { .. }));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = encode_document(&bson_doc! { "a" => 1 }).unwrap();
        bytes.push(0xAA);
        assert_eq!(
            err_of(&bytes),
            CodecError::TrailingData {
                declared: 12,
                actual: 13
            }
        );
    }

    #[test]
    fn test_unknown_type_tag() {
        // {"a": <0x13 decimal128>} is outside the supported tag set
        let mut bytes = vec![0, 0, 0, 0, 0x13, b'a', 0];
        bytes.extend_from_slice(&[0; 16]);
        bytes.push(0);
        let len = bytes.len() as i32;
        bytes[..4].copy_from_slice(&len.to_le_bytes());

        match err_of(&bytes) {
            CodecError::UnknownTypeTag { tag, offset, path } => {
                assert_eq!(tag, 0x13);
                assert_eq!(offset, 4);
                assert_eq!(path, "a");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nested_length_overrunning_parent() {
        let mut bytes = encode_document(&bson_doc! { "d" => bson_doc! { "x" => 1 } }).unwrap();
        // inflate the nested document's length prefix
        bytes[7] = 0x40;
        assert!(matches!(err_of(&bytes), CodecError::TruncatedDocument { offset: 7, .. }));
    }

    #[test]
    fn test_early_terminator() {
        // declares 6 bytes, terminator at byte 4, one stray byte left inside
        let bytes = [6, 0, 0, 0, 0, 0];
        assert!(matches!(err_of(&bytes), CodecError::Malformed { .. }));
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut bytes = encode_document(&bson_doc! { "s" => "ab" }).unwrap();
        bytes[11] = 0xFF;
        assert!(matches!(err_of(&bytes), CodecError::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_string_without_terminator() {
        let mut bytes = encode_document(&bson_doc! { "s" => "ab" }).unwrap();
        bytes[13] = b'c';
        assert!(matches!(err_of(&bytes), CodecError::Malformed { .. }));
    }

    #[test]
    fn test_bad_boolean_byte() {
        let mut bytes = encode_document(&bson_doc! { "b" => true }).unwrap();
        bytes[7] = 2;
        assert!(matches!(err_of(&bytes), CodecError::Malformed { offset: 7, .. }));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut bytes = vec![0, 0, 0, 0];
        for _ in 0..2 {
            bytes.extend_from_slice(&[0x0A, b'k', 0]);
        }
        bytes.push(0);
        let len = bytes.len() as i32;
        bytes[..4].copy_from_slice(&len.to_le_bytes());
        assert!(matches!(err_of(&bytes), CodecError::DuplicateField { .. }));
    }

    #[test]
    fn test_prefix_decoding_reports_consumed_bytes() {
        let mut bytes = encode_document(&bson_doc! { "a" => 1 }).unwrap();
        let first_len = bytes.len();
        bytes.extend(encode_document(&bson_doc! { "b" => 2 }).unwrap());

        let (doc, used) = decode_document_prefix(&bytes).unwrap();
        assert_eq!(used, first_len);
        assert_eq!(doc.get_i32("a"), Some(1));

        let (second, _) = decode_document_prefix(&bytes[used..]).unwrap();
        assert_eq!(second.get_i32("b"), Some(2));
    }

    #[test]
    fn test_array_order_preserved() {
        let doc = bson_doc! { "a" => vec![Bson::from("z"), Bson::from("a"), Bson::from("m")] };
        let decoded = decode_document(&encode_document(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
    }
}
