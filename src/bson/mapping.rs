//! Mapping between host values and BSON values
//!
//! - [`ToBson`] / [`FromBson`] map individual host values to one BSON kind
//! - [`BsonShape`] describes a structure's members in declaration order
//! - [`FieldWriter`] / [`FieldReader`] bind member names to values
//!
//! An absent nullable (`Option::None`) member is omitted from the encoded
//! document. A member missing from a decoded document keeps its
//! `Default` value, which is `None` for `Option<T>`; present zero, `false`
//! and empty-string values round-trip as themselves. Unknown fields are
//! skipped.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet, LinkedList, VecDeque};
use std::hash::Hash;

use super::container::{CollectionTarget, Strategy, reconstruct};
use super::document::Document;
use super::oid::ObjectId;
use super::path::FieldPath;
use super::value::{Binary, Bson, Regex};
use crate::error::{CodecError, Result, WireError};

/// A host value with a BSON encoding
pub trait ToBson {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson>;

    /// Whether the value is the absent state of a nullable
    fn is_absent(&self) -> bool {
        false
    }
}

/// A host value that can be rebuilt from BSON
pub trait FromBson: Sized {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self>;
}

/// A structure with a declared, ordered member list
///
/// Usually implemented through [`bson_shape!`](crate::bson_shape).
pub trait BsonShape: Sized {
    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> Result<()>;
    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>;
}

/// Encode a structure into a document
pub fn to_document<T: BsonShape>(value: &T) -> Result<Document> {
    to_document_at(value, &FieldPath::Root)
}

/// Decode a structure from a document
pub fn from_document<T: BsonShape>(doc: Document) -> Result<T> {
    from_document_at(doc, &FieldPath::Root)
}

pub fn to_document_at<T: BsonShape>(value: &T, path: &FieldPath<'_>) -> Result<Document> {
    let mut writer = FieldWriter::new(path);
    value.write_fields(&mut writer)?;
    Ok(writer.finish())
}

pub fn from_document_at<T: BsonShape>(doc: Document, path: &FieldPath<'_>) -> Result<T> {
    let mut reader = FieldReader::new(doc, path);
    T::read_fields(&mut reader)
}

/// Collects a structure's members into a document
pub struct FieldWriter<'a> {
    doc: Document,
    path: &'a FieldPath<'a>,
}

impl<'a> FieldWriter<'a> {
    pub fn new(path: &'a FieldPath<'a>) -> Self {
        Self {
            doc: Document::new(),
            path,
        }
    }

    /// Bind `name` to `value`; absent values are skipped
    pub fn field<T: ToBson + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        if value.is_absent() {
            return Ok(());
        }
        let child = self.path.key(name);
        let bson = value.to_bson(&child)?;
        self.doc.insert(name, bson);
        Ok(())
    }

    pub fn finish(self) -> Document {
        self.doc
    }
}

/// Hands out a decoded document's fields by name
///
/// Fields that are never asked for are ignored.
pub struct FieldReader<'a> {
    doc: Document,
    path: &'a FieldPath<'a>,
}

impl<'a> FieldReader<'a> {
    pub fn new(doc: Document, path: &'a FieldPath<'a>) -> Self {
        Self { doc, path }
    }

    /// Take a field, leaving `T::default()` when it is missing
    pub fn field<T: FromBson + Default>(&mut self, name: &str) -> Result<T> {
        match self.doc.take(name) {
            Some(value) => T::from_bson(value, &self.path.key(name)),
            None => Ok(T::default()),
        }
    }

    /// Take a field that must be present
    pub fn required<T: FromBson>(&mut self, name: &str) -> Result<T> {
        let child = self.path.key(name);
        match self.doc.take(name) {
            Some(value) => T::from_bson(value, &child),
            None => Err(CodecError::TypeMismatch {
                path: child.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                found: "missing field".to_string(),
            }
            .into()),
        }
    }

    /// Decode an array field into an existing collection, extending it in place
    ///
    /// A missing field leaves `target` untouched, and so does any error.
    pub fn field_into<C>(&mut self, name: &str, target: &mut C) -> Result<()>
    where
        C: CollectionTarget + Default,
        C::Element: FromBson,
    {
        let Some(value) = self.doc.take(name) else {
            return Ok(());
        };
        let descriptor = C::descriptor();
        if Strategy::select(&descriptor)? == Strategy::FixedArray {
            return Err(CodecError::InvalidState(format!(
                "fixed-size {} cannot be appended to in place",
                descriptor.type_name
            ))
            .into());
        }
        let child = self.path.key(name);
        let elements = array_elements::<C::Element>(value, &child)?;
        let existing = std::mem::take(target);
        *target = reconstruct(elements, Some(existing))?;
        Ok(())
    }

    pub fn path(&self) -> &FieldPath<'a> {
        self.path
    }
}

/// Declare a structure's BSON field binding in member order.
///
/// Every listed member must implement `ToBson`, `FromBson` and `Default`.
/// The structure also becomes usable as a nested field value.
///
/// ```
/// use mongowire::bson_shape;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct DbInfo {
///     name: String,
///     size_on_disk: i64,
/// }
///
/// bson_shape!(DbInfo {
///     "Name" => name,
///     "SizeOnDisk" => size_on_disk,
/// });
///
/// let bytes = mongowire::bson::to_vec(&DbInfo { name: "DBTest".into(), size_on_disk: 42 }).unwrap();
/// let back: DbInfo = mongowire::bson::from_slice(&bytes).unwrap();
/// assert_eq!(back.size_on_disk, 42);
/// ```
#[macro_export]
macro_rules! bson_shape {
    ($ty:ident { $($name:literal => $member:ident),* $(,)? }) => {
        impl $crate::bson::BsonShape for $ty {
            fn write_fields(
                &self,
                fields: &mut $crate::bson::FieldWriter<'_>,
            ) -> $crate::error::Result<()> {
                $( fields.field($name, &self.$member)?; )*
                Ok(())
            }

            fn read_fields(
                fields: &mut $crate::bson::FieldReader<'_>,
            ) -> $crate::error::Result<Self> {
                Ok(Self {
                    $( $member: fields.field($name)?, )*
                })
            }
        }

        $crate::bson_nested!($ty);
    };
}

/// Make a [`BsonShape`] usable as a nested document field.
#[macro_export]
macro_rules! bson_nested {
    ($ty:ty) => {
        impl $crate::bson::ToBson for $ty {
            fn to_bson(
                &self,
                path: &$crate::bson::FieldPath<'_>,
            ) -> $crate::error::Result<$crate::bson::Bson> {
                $crate::bson::to_document_at(self, path).map($crate::bson::Bson::Document)
            }
        }

        impl $crate::bson::FromBson for $ty {
            fn from_bson(
                value: $crate::bson::Bson,
                path: &$crate::bson::FieldPath<'_>,
            ) -> $crate::error::Result<Self> {
                match value {
                    $crate::bson::Bson::Document(doc) => $crate::bson::from_document_at(doc, path),
                    other => Err($crate::bson::mapping::mismatch(path, "Document", &other)),
                }
            }
        }
    };
}

/// Nests any [`BsonShape`] as a document field without going through the macro
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nested<T>(pub T);

impl<T: BsonShape> ToBson for Nested<T> {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        to_document_at(&self.0, path).map(Bson::Document)
    }
}

impl<T: BsonShape> FromBson for Nested<T> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Document(doc) => from_document_at(doc, path).map(Nested),
            other => Err(mismatch(path, "Document", &other)),
        }
    }
}

/// Build a `TypeMismatch` error for `found` at `path`
pub fn mismatch(path: &FieldPath<'_>, expected: &str, found: &Bson) -> WireError {
    CodecError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
    }
    .into()
}

fn unsupported(path: &FieldPath<'_>, type_name: &str) -> WireError {
    CodecError::UnsupportedType {
        type_name: type_name.to_string(),
        path: path.to_string(),
    }
    .into()
}

/* ========================= Scalars ========================= */

impl ToBson for bool {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Boolean(*self))
    }
}

impl FromBson for bool {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Boolean(b) => Ok(b),
            other => Err(mismatch(path, "Boolean", &other)),
        }
    }
}

// Integers encode as Int32 when they fit, otherwise Int64; anything wider
// than i64 has no mapping.
macro_rules! impl_integer {
    ($($t:ty),*) => {$(
        impl ToBson for $t {
            fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
                if let Ok(small) = i32::try_from(*self) {
                    return Ok(Bson::Int32(small));
                }
                i64::try_from(*self)
                    .map(Bson::Int64)
                    .map_err(|_| unsupported(path, &format!("{} value {}", stringify!($t), self)))
            }
        }

        impl FromBson for $t {
            fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
                let wide = match &value {
                    Bson::Int32(n) => i64::from(*n),
                    Bson::Int64(n) => *n,
                    other => return Err(mismatch(path, stringify!($t), other)),
                };
                <$t>::try_from(wide).map_err(|_| {
                    CodecError::TypeMismatch {
                        path: path.to_string(),
                        expected: stringify!($t).to_string(),
                        found: format!("{} {}", value.kind_name(), wide),
                    }
                    .into()
                })
            }
        }
    )*};
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, i128, u128);

impl ToBson for f64 {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Double(*self))
    }
}

/// Integers widen to `f64`
impl FromBson for f64 {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Double(f) => Ok(f),
            Bson::Int32(n) => Ok(f64::from(n)),
            Bson::Int64(n) => Ok(n as f64),
            other => Err(mismatch(path, "Double", &other)),
        }
    }
}

impl ToBson for f32 {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Double(f64::from(*self)))
    }
}

impl FromBson for f32 {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        f64::from_bson(value, path).map(|f| f as f32)
    }
}

impl ToBson for str {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::String(self.to_owned()))
    }
}

impl ToBson for String {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::String(self.clone()))
    }
}

impl FromBson for String {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::String(s) | Bson::Symbol(s) => Ok(s),
            other => Err(mismatch(path, "String", &other)),
        }
    }
}

impl ToBson for char {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::String(self.to_string()))
    }
}

impl ToBson for ObjectId {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::ObjectId(*self))
    }
}

impl FromBson for ObjectId {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::ObjectId(id) => Ok(id),
            other => Err(mismatch(path, "ObjectId", &other)),
        }
    }
}

impl ToBson for DateTime<Utc> {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::UtcDateTime(self.timestamp_millis()))
    }
}

impl FromBson for DateTime<Utc> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::UtcDateTime(ms) => DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                CodecError::TypeMismatch {
                    path: path.to_string(),
                    expected: "DateTime<Utc>".to_string(),
                    found: format!("UtcDateTime {ms} (out of range)"),
                }
                .into()
            }),
            other => Err(mismatch(path, "UtcDateTime", &other)),
        }
    }
}

impl ToBson for Binary {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Binary(self.clone()))
    }
}

impl FromBson for Binary {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Binary(bin) => Ok(bin),
            other => Err(mismatch(path, "Binary", &other)),
        }
    }
}

impl Default for Binary {
    fn default() -> Self {
        Binary::generic(Vec::new())
    }
}

impl ToBson for Regex {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Regex(self.clone()))
    }
}

impl FromBson for Regex {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Regex(re) => Ok(re),
            other => Err(mismatch(path, "Regex", &other)),
        }
    }
}

impl ToBson for Document {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(Bson::Document(self.clone()))
    }
}

impl FromBson for Document {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Document(doc) => Ok(doc),
            other => Err(mismatch(path, "Document", &other)),
        }
    }
}

impl ToBson for Bson {
    fn to_bson(&self, _: &FieldPath<'_>) -> Result<Bson> {
        Ok(self.clone())
    }
}

impl FromBson for Bson {
    fn from_bson(value: Bson, _: &FieldPath<'_>) -> Result<Self> {
        Ok(value)
    }
}

impl Default for Bson {
    fn default() -> Self {
        Bson::Null
    }
}

/* ========================= Nullable ========================= */

impl<T: ToBson> ToBson for Option<T> {
    /// `None` only reaches here inside arrays, where it encodes as `Null`
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        match self {
            Some(value) => value.to_bson(path),
            None => Ok(Bson::Null),
        }
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl<T: FromBson> FromBson for Option<T> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_bson(value, path).map(Some)
    }
}

/* ========================= Collections ========================= */

fn encode_sequence<'v, T, I>(items: I, path: &FieldPath<'_>) -> Result<Bson>
where
    T: ToBson + 'v,
    I: IntoIterator<Item = &'v T>,
{
    let mut out = Vec::new();
    for (idx, item) in items.into_iter().enumerate() {
        out.push(item.to_bson(&path.index(idx))?);
    }
    Ok(Bson::Array(out))
}

fn array_elements<T: FromBson>(value: Bson, path: &FieldPath<'_>) -> Result<Vec<T>> {
    match value {
        Bson::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| T::from_bson(item, &path.index(idx)))
            .collect(),
        other => Err(mismatch(path, "Array", &other)),
    }
}

/// Decode an array into any collection target, without an existing instance
pub fn decode_collection<C>(value: Bson, path: &FieldPath<'_>) -> Result<C>
where
    C: CollectionTarget,
    C::Element: FromBson,
{
    let elements = array_elements::<C::Element>(value, path)?;
    reconstruct(elements, None)
}

macro_rules! impl_sequence {
    ($($coll:ident $(: $bound:path)?),*) => {$(
        impl<T: ToBson> ToBson for $coll<T> {
            fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
                encode_sequence(self.iter(), path)
            }
        }

        impl<T: FromBson $(+ $bound)?> FromBson for $coll<T> {
            fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
                decode_collection(value, path)
            }
        }
    )*};
}

impl_sequence!(Vec, VecDeque, LinkedList, BTreeSet: Ord);

impl<T: ToBson> ToBson for HashSet<T> {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        encode_sequence(self.iter(), path)
    }
}

impl<T: FromBson + Hash + Eq> FromBson for HashSet<T> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        decode_collection(value, path)
    }
}

impl<T: ToBson> ToBson for [T] {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        encode_sequence(self.iter(), path)
    }
}

impl<T: ToBson, const N: usize> ToBson for [T; N] {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        encode_sequence(self.iter(), path)
    }
}

impl<T: FromBson, const N: usize> FromBson for [T; N] {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        decode_collection(value, path)
    }
}

impl<T: ToBson> ToBson for Box<[T]> {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        encode_sequence(self.iter(), path)
    }
}

impl<T: FromBson> FromBson for Box<[T]> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        decode_collection(value, path)
    }
}

/// Open maps encode in key order
impl<T: ToBson> ToBson for BTreeMap<String, T> {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        let mut doc = Document::with_capacity(self.len());
        for (key, value) in self {
            if value.is_absent() {
                continue;
            }
            doc.insert(key.clone(), value.to_bson(&path.key(key))?);
        }
        Ok(Bson::Document(doc))
    }
}

impl<T: FromBson> FromBson for BTreeMap<String, T> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Document(doc) => {
                let mut map = BTreeMap::new();
                for (key, value) in doc {
                    let item = T::from_bson(value, &path.key(&key))?;
                    map.insert(key, item);
                }
                Ok(map)
            }
            other => Err(mismatch(path, "Document", &other)),
        }
    }
}
