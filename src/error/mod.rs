//! Error handling module for BSON and wire-protocol operations.
//!
//! This module provides:
//! - The codec error taxonomy (length, tag, field name and mapping failures)
//! - Protocol errors (framing, query failure, correlation)
//! - Configuration errors
//!
//! Transport I/O errors are carried unmodified in [`WireError::Io`].
//!
//! # Example
//!
//! ```rust
//! use mongowire::error::{CodecError, Result, WireError};
//!
//! fn check(len: usize) -> Result<()> {
//!     if len < 5 {
//!         return Err(CodecError::TruncatedDocument {
//!             offset: 0,
//!             declared: 5,
//!             available: len,
//!         }
//!         .into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(check(1), Err(WireError::Codec(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{CodecError, ConfigError, ProtocolError, Result, WireError};
