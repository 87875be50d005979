//! BSON value model
//!
//! This module defines the tagged union of BSON value kinds and the
//! one-byte element type tags used on the wire.

use std::fmt;

use super::document::Document;
use super::oid::ObjectId;

/// Element type tags as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    UtcDateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    Reference = 0x0C,
    Code = 0x0D,
    Symbol = 0x0E,
    ScopedCode = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
}

impl ElementType {
    /// Map a raw tag byte to an element type
    ///
    /// # Returns
    /// * `None` for bytes outside the supported tag range
    pub fn from_u8(tag: u8) -> Option<Self> {
        let kind = match tag {
            0x01 => ElementType::Double,
            0x02 => ElementType::String,
            0x03 => ElementType::Document,
            0x04 => ElementType::Array,
            0x05 => ElementType::Binary,
            0x06 => ElementType::Undefined,
            0x07 => ElementType::ObjectId,
            0x08 => ElementType::Boolean,
            0x09 => ElementType::UtcDateTime,
            0x0A => ElementType::Null,
            0x0B => ElementType::Regex,
            0x0C => ElementType::Reference,
            0x0D => ElementType::Code,
            0x0E => ElementType::Symbol,
            0x0F => ElementType::ScopedCode,
            0x10 => ElementType::Int32,
            0x11 => ElementType::Timestamp,
            0x12 => ElementType::Int64,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable kind name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Double => "Double",
            ElementType::String => "String",
            ElementType::Document => "Document",
            ElementType::Array => "Array",
            ElementType::Binary => "Binary",
            ElementType::Undefined => "Undefined",
            ElementType::ObjectId => "ObjectId",
            ElementType::Boolean => "Boolean",
            ElementType::UtcDateTime => "UtcDateTime",
            ElementType::Null => "Null",
            ElementType::Regex => "Regex",
            ElementType::Reference => "Reference",
            ElementType::Code => "Code",
            ElementType::Symbol => "Symbol",
            ElementType::ScopedCode => "ScopedCode",
            ElementType::Int32 => "Int32",
            ElementType::Timestamp => "Timestamp",
            ElementType::Int64 => "Int64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary payload with its subtype byte
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub const GENERIC: u8 = 0x00;
    pub const FUNCTION: u8 = 0x01;
    pub const BINARY_OLD: u8 = 0x02;
    pub const UUID_OLD: u8 = 0x03;
    pub const UUID: u8 = 0x04;
    pub const MD5: u8 = 0x05;
    pub const USER_DEFINED: u8 = 0x80;

    /// Create a generic (subtype 0) binary value
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: Self::GENERIC,
            bytes: bytes.into(),
        }
    }
}

/// Regular expression with its option flags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    /// Create a regex; option characters are stored sorted, as the format requires
    pub fn new(pattern: impl Into<String>, options: impl AsRef<str>) -> Self {
        let mut chars: Vec<char> = options.as_ref().chars().collect();
        chars.sort_unstable();
        Self {
            pattern: pattern.into(),
            options: chars.into_iter().collect(),
        }
    }
}

/// A single BSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Bson>),
    Binary(Binary),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    UtcDateTime(i64),
    Null,
    Regex(Regex),
    /// Deprecated DBPointer: a namespace plus the referenced id
    Reference {
        namespace: String,
        id: ObjectId,
    },
    Code(String),
    Symbol(String),
    ScopedCode {
        code: String,
        scope: Document,
    },
    Int32(i32),
    Timestamp(u64),
    Int64(i64),
}

impl Bson {
    /// Wire tag of this value
    pub fn element_type(&self) -> ElementType {
        match self {
            Bson::Double(_) => ElementType::Double,
            Bson::String(_) => ElementType::String,
            Bson::Document(_) => ElementType::Document,
            Bson::Array(_) => ElementType::Array,
            Bson::Binary(_) => ElementType::Binary,
            Bson::Undefined => ElementType::Undefined,
            Bson::ObjectId(_) => ElementType::ObjectId,
            Bson::Boolean(_) => ElementType::Boolean,
            Bson::UtcDateTime(_) => ElementType::UtcDateTime,
            Bson::Null => ElementType::Null,
            Bson::Regex(_) => ElementType::Regex,
            Bson::Reference { .. } => ElementType::Reference,
            Bson::Code(_) => ElementType::Code,
            Bson::Symbol(_) => ElementType::Symbol,
            Bson::ScopedCode { .. } => ElementType::ScopedCode,
            Bson::Int32(_) => ElementType::Int32,
            Bson::Timestamp(_) => ElementType::Timestamp,
            Bson::Int64(_) => ElementType::Int64,
        }
    }

    /// Kind name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        self.element_type().name()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Bson::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer value, widening `Int32`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bson::Double(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bson::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Bson]> {
        match self {
            Bson::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Bson::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether the value is `Null` or `Undefined`
    pub fn is_null(&self) -> bool {
        matches!(self, Bson::Null | Bson::Undefined)
    }
}

impl From<f64> for Bson {
    fn from(value: f64) -> Self {
        Bson::Double(value)
    }
}

impl From<i32> for Bson {
    fn from(value: i32) -> Self {
        Bson::Int32(value)
    }
}

/// Narrowest integer tag that holds the value
impl From<i64> for Bson {
    fn from(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(value),
        }
    }
}

impl From<bool> for Bson {
    fn from(value: bool) -> Self {
        Bson::Boolean(value)
    }
}

impl From<&str> for Bson {
    fn from(value: &str) -> Self {
        Bson::String(value.to_owned())
    }
}

impl From<String> for Bson {
    fn from(value: String) -> Self {
        Bson::String(value)
    }
}

impl From<Document> for Bson {
    fn from(value: Document) -> Self {
        Bson::Document(value)
    }
}

impl From<Vec<Bson>> for Bson {
    fn from(value: Vec<Bson>) -> Self {
        Bson::Array(value)
    }
}

impl From<ObjectId> for Bson {
    fn from(value: ObjectId) -> Self {
        Bson::ObjectId(value)
    }
}

impl From<Binary> for Bson {
    fn from(value: Binary) -> Self {
        Bson::Binary(value)
    }
}

impl From<Regex> for Bson {
    fn from(value: Regex) -> Self {
        Bson::Regex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_table_round_trip() {
        for tag in 0x01..=0x12u8 {
            let kind = ElementType::from_u8(tag).expect("known tag");
            assert_eq!(kind as u8, tag);
        }
        assert_eq!(ElementType::from_u8(0x00), None);
        assert_eq!(ElementType::from_u8(0x13), None);
        assert_eq!(ElementType::from_u8(0x7F), None);
        assert_eq!(ElementType::from_u8(0xFF), None);
    }

    #[test]
    fn test_integer_narrowing() {
        assert_eq!(Bson::from(42i64), Bson::Int32(42));
        assert_eq!(Bson::from(i64::from(i32::MAX)), Bson::Int32(i32::MAX));
        assert_eq!(
            Bson::from(i64::from(i32::MAX) + 1),
            Bson::Int64(i64::from(i32::MAX) + 1)
        );
        assert_eq!(Bson::from(i64::MIN), Bson::Int64(i64::MIN));
    }

    #[test]
    fn test_regex_options_sorted() {
        let re = Regex::new("^a", "xmi");
        assert_eq!(re.options, "imx");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Bson::Int32(7).as_i64(), Some(7));
        assert_eq!(Bson::Int64(7).as_i32(), None);
        assert!(Bson::Undefined.is_null());
        assert_eq!(Bson::from("x").kind_name(), "String");
    }
}
