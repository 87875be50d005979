//! BSON codec
//!
//! This module turns host values into BSON bytes and back:
//! - Value model: [`Bson`], [`Document`], [`ObjectId`] and friends
//! - Field binding: [`BsonShape`] structures with declared member order
//! - Encoding and decoding with field-path diagnostics
//! - Collection reconstruction for array-typed members
//! - Discriminated multi-shape documents
//! - Extended JSON conversion for display and input
//!
//! # Design
//!
//! Host types describe themselves through traits instead of runtime type
//! inspection. Scalars implement [`ToBson`] / [`FromBson`]; structures
//! implement [`BsonShape`], usually via [`bson_shape!`](crate::bson_shape);
//! collections implement [`CollectionTarget`], whose static descriptor
//! drives the reconstructor's strategy choice.

pub mod container;
mod decoder;
mod document;
mod encoder;
mod json;
pub mod mapping;
pub mod oid;
mod path;
mod value;
pub mod variant;

pub use container::{Capability, CollectionDescriptor, CollectionTarget, Strategy, reconstruct};
pub use decoder::{decode_document, decode_document_prefix, from_slice};
pub use document::Document;
pub use encoder::{Encoder, encode_document, to_vec};
pub use mapping::{
    BsonShape, FieldReader, FieldWriter, FromBson, Nested, ToBson, from_document, from_document_at, to_document,
    to_document_at,
};
pub use oid::{ObjectId, ObjectIdGenerator};
pub use path::FieldPath;
pub use value::{Binary, Bson, ElementType, Regex};
pub use variant::{Tagged, TaggedShape};

/// Encode a structure to BSON bytes
pub fn encode<T: BsonShape>(value: &T) -> crate::error::Result<Vec<u8>> {
    to_vec(value)
}

/// Decode BSON bytes into a structure
pub fn decode<T: BsonShape>(bytes: &[u8]) -> crate::error::Result<T> {
    from_slice(bytes)
}

#[cfg(test)]
mod tests;
