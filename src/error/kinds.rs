use std::{fmt, io};

use crate::bson::Document;

/// Crate-wide `Result` type using [`WireError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Top-level error type for mongowire operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum WireError {
    /// BSON encoding/decoding errors.
    Codec(CodecError),

    /// Wire-protocol framing and reply errors.
    Protocol(ProtocolError),

    /// Configuration errors.
    Config(ConfigError),

    /// Transport I/O errors, passed through unmodified.
    Io(io::Error),

    /// Transport deadline elapsed.
    Timeout(String),

    /// Generic error with a free-form message.
    Generic(String),
}

/// BSON codec errors.
///
/// Every variant is a data or contract violation, never a transient
/// condition, and carries the field path, byte offset or type name needed
/// to diagnose it.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// A host value has no BSON mapping.
    UnsupportedType { type_name: String, path: String },

    /// A field name contains an embedded NUL byte.
    FieldName { name: String, path: String },

    /// The buffer is shorter than the declared document length.
    TruncatedDocument {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The buffer holds bytes past the declared document length.
    TrailingData { declared: usize, actual: usize },

    /// An element type byte outside the known tag range.
    UnknownTypeTag { tag: u8, offset: usize, path: String },

    /// ObjectId text that is not exactly 24 hex characters.
    MalformedIdentifier(String),

    /// Operation not valid for the current state of a value.
    InvalidState(String),

    /// Target collection type exposes none of the supported capabilities.
    UnsupportedCollectionType { type_name: String },

    /// Decoded value kind does not match the declared target type.
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// String payload is not valid UTF-8.
    InvalidUtf8 { offset: usize },

    /// Structurally invalid bytes (bad nested length, missing terminator).
    Malformed { offset: usize, reason: String },

    /// Discriminator value with no matching variant.
    UnknownDiscriminator { path: String, value: String },

    /// The same field name appears twice in one document.
    DuplicateField { name: String, offset: usize },
}

/// Wire-protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The server flagged the query as failed; carries the error document.
    QueryFailure(Document),

    /// The server no longer knows the requested cursor.
    CursorNotFound(i64),

    /// Message length or opcode invariant violated.
    Framing(String),

    /// Reply `responseTo` does not match the request id.
    CorrelationMismatch { expected: i32, found: i32 },

    /// Namespace is not of the form `database.collection`.
    InvalidNamespace(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Codec(e) => write!(f, "Codec error: {e}"),
            WireError::Protocol(e) => write!(f, "Protocol error: {e}"),
            WireError::Config(e) => write!(f, "Configuration error: {e}"),
            WireError::Io(e) => write!(f, "I/O error: {e}"),
            WireError::Timeout(what) => write!(f, "Timed out: {what}"),
            WireError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnsupportedType { type_name, path } => {
                write!(f, "No BSON mapping for type '{type_name}' at '{path}'")
            }
            CodecError::FieldName { name, path } => {
                write!(f, "Field name {name:?} at '{path}' contains a NUL byte")
            }
            CodecError::TruncatedDocument {
                offset,
                declared,
                available,
            } => write!(
                f,
                "Truncated document at offset {offset}: declared {declared} bytes, {available} available"
            ),
            CodecError::TrailingData { declared, actual } => write!(
                f,
                "Trailing data: document declares {declared} bytes but buffer holds {actual}"
            ),
            CodecError::UnknownTypeTag { tag, offset, path } => write!(
                f,
                "Unknown type tag 0x{tag:02x} at offset {offset} (field '{path}')"
            ),
            CodecError::MalformedIdentifier(text) => {
                write!(f, "Malformed ObjectId {text:?}: expected 24 hex characters")
            }
            CodecError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            CodecError::UnsupportedCollectionType { type_name } => {
                write!(f, "Unsupported collection type: {type_name}")
            }
            CodecError::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "Type mismatch at '{path}': expected {expected}, found {found}"),
            CodecError::InvalidUtf8 { offset } => {
                write!(f, "Invalid UTF-8 in string at offset {offset}")
            }
            CodecError::Malformed { offset, reason } => {
                write!(f, "Malformed BSON at offset {offset}: {reason}")
            }
            CodecError::UnknownDiscriminator { path, value } => {
                write!(f, "Unknown discriminator '{value}' at '{path}'")
            }
            CodecError::DuplicateField { name, offset } => {
                write!(f, "Duplicate field '{name}' at offset {offset}")
            }
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::QueryFailure(doc) => {
                let reason = doc
                    .get("$err")
                    .or_else(|| doc.get("errmsg"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                write!(f, "Query failure: {reason}")
            }
            ProtocolError::CursorNotFound(id) => write!(f, "Cursor not found: {id}"),
            ProtocolError::Framing(msg) => write!(f, "Framing error: {msg}"),
            ProtocolError::CorrelationMismatch { expected, found } => write!(
                f,
                "Reply responseTo {found} does not match request id {expected}"
            ),
            ProtocolError::InvalidNamespace(ns) => {
                write!(f, "Invalid namespace '{ns}': expected 'database.collection'")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Codec(e) => Some(e),
            WireError::Protocol(e) => Some(e),
            WireError::Config(e) => Some(e),
            WireError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for CodecError {}
impl std::error::Error for ProtocolError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to WireError ========================= */

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        WireError::Io(err)
    }
}

impl From<CodecError> for WireError {
    fn from(err: CodecError) -> Self {
        WireError::Codec(err)
    }
}

impl From<ProtocolError> for WireError {
    fn from(err: ProtocolError) -> Self {
        WireError::Protocol(err)
    }
}

impl From<ConfigError> for WireError {
    fn from(err: ConfigError) -> Self {
        WireError::Config(err)
    }
}

impl From<String> for WireError {
    fn from(msg: String) -> Self {
        WireError::Generic(msg)
    }
}

impl From<&str> for WireError {
    fn from(msg: &str) -> Self {
        WireError::Generic(msg.to_owned())
    }
}

impl WireError {
    /// Borrow the codec error, if this is one.
    pub fn as_codec(&self) -> Option<&CodecError> {
        match self {
            WireError::Codec(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the protocol error, if this is one.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            WireError::Protocol(e) => Some(e),
            _ => None,
        }
    }
}
