//! mongowire
//!
//! A BSON codec and MongoDB legacy wire-protocol library.
//!
//! # Modules
//!
//! - `bson`: Value model, binary codec, ObjectIds, field binding and
//!   collection reconstruction
//! - `wire`: Message framing, request builders and reply parsing
//! - `transport`: Async byte-stream transport for framed messages
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `cli`: Command-line interface and argument parsing
//!
//! # Example
//!
//! ```
//! use mongowire::bson::{decode, encode};
//! use mongowire::bson_shape;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct DbInfo {
//!     name: String,
//!     size_on_disk: i64,
//! }
//!
//! bson_shape!(DbInfo {
//!     "Name" => name,
//!     "SizeOnDisk" => size_on_disk,
//! });
//!
//! let info = DbInfo { name: "DBTest".into(), size_on_disk: 42 };
//! let bytes = encode(&info).unwrap();
//! assert_eq!(bytes.len(), 38);
//! assert_eq!(decode::<DbInfo>(&bytes).unwrap(), info);
//! ```

pub mod bson;
pub mod cli;
pub mod config;
pub mod error;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use bson::{Bson, Document, ObjectId};
pub use config::Config;
pub use error::{Result, WireError};
pub use transport::{TcpTransport, Transport};
pub use wire::{Reply, WireClient, WireMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
