//! Discriminated multi-shape documents
//!
//! A [`TaggedShape`] is a closed set of shapes sharing one document slot.
//! The encoded document carries a string discriminator field (by default
//! `_t`) ahead of the variant's own fields; decoding reads the
//! discriminator and lets the type pick the matching variant.

use super::mapping::{BsonShape, FieldReader, FieldWriter, FromBson, ToBson, from_document_at, mismatch, to_document_at};
use super::path::FieldPath;
use super::value::Bson;
use crate::error::{CodecError, Result};

/// A closed set of document shapes told apart by a discriminator field
pub trait TaggedShape: Sized {
    const DISCRIMINATOR: &'static str = "_t";

    /// Discriminator value of this variant
    fn variant_name(&self) -> &'static str;

    /// Write the variant's own fields (without the discriminator)
    fn write_variant(&self, fields: &mut FieldWriter<'_>) -> Result<()>;

    /// Read the variant named `name`
    ///
    /// # Returns
    /// * `Ok(None)` - `name` is not one of this type's variants
    fn read_variant(name: &str, fields: &mut FieldReader<'_>) -> Result<Option<Self>>;
}

/// Binds a [`TaggedShape`] as a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tagged<T>(pub T);

impl<T> Tagged<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: TaggedShape> BsonShape for Tagged<T> {
    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> Result<()> {
        fields.field(T::DISCRIMINATOR, self.0.variant_name())?;
        self.0.write_variant(fields)
    }

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self> {
        let name: String = fields.required(T::DISCRIMINATOR)?;
        match T::read_variant(&name, fields)? {
            Some(value) => Ok(Tagged(value)),
            None => Err(CodecError::UnknownDiscriminator {
                path: fields.path().key(T::DISCRIMINATOR).to_string(),
                value: name,
            }
            .into()),
        }
    }
}

impl<T: TaggedShape> ToBson for Tagged<T> {
    fn to_bson(&self, path: &FieldPath<'_>) -> Result<Bson> {
        to_document_at(self, path).map(Bson::Document)
    }
}

impl<T: TaggedShape> FromBson for Tagged<T> {
    fn from_bson(value: Bson, path: &FieldPath<'_>) -> Result<Self> {
        match value {
            Bson::Document(doc) => from_document_at(doc, path),
            other => Err(mismatch(path, "Document", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::{decode_document, encode_document, from_slice, to_vec};
    use crate::{bson_doc, bson_shape};

    #[derive(Debug, Clone, PartialEq)]
    enum Shape {
        Circle { radius: f64 },
        Rect { width: i32, height: i32 },
    }

    impl TaggedShape for Shape {
        fn variant_name(&self) -> &'static str {
            match self {
                Shape::Circle { .. } => "circle",
                Shape::Rect { .. } => "rect",
            }
        }

        fn write_variant(&self, fields: &mut FieldWriter<'_>) -> Result<()> {
            match self {
                Shape::Circle { radius } => fields.field("radius", radius),
                Shape::Rect { width, height } => {
                    fields.field("width", width)?;
                    fields.field("height", height)
                }
            }
        }

        fn read_variant(name: &str, fields: &mut FieldReader<'_>) -> Result<Option<Self>> {
            Ok(match name {
                "circle" => Some(Shape::Circle {
                    radius: fields.field("radius")?,
                }),
                "rect" => Some(Shape::Rect {
                    width: fields.field("width")?,
                    height: fields.field("height")?,
                }),
                _ => None,
            })
        }
    }

    impl Default for Shape {
        fn default() -> Self {
            Shape::Circle { radius: 0.0 }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Drawing {
        title: String,
        shapes: Vec<Tagged<Shape>>,
    }

    bson_shape!(Drawing {
        "title" => title,
        "shapes" => shapes,
    });

    #[test]
    fn test_discriminator_is_written_first() {
        let bytes = to_vec(&Tagged(Shape::Rect { width: 2, height: 3 })).unwrap();
        let doc = decode_document(&bytes).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["_t", "width", "height"]);
        assert_eq!(doc.get_str("_t"), Some("rect"));
    }

    #[test]
    fn test_variants_round_trip() {
        for shape in [Shape::Circle { radius: 1.5 }, Shape::Rect { width: 4, height: 5 }] {
            let bytes = to_vec(&Tagged(shape.clone())).unwrap();
            let back: Tagged<Shape> = from_slice(&bytes).unwrap();
            assert_eq!(back.into_inner(), shape);
        }
    }

    #[test]
    fn test_discriminator_position_does_not_matter_on_decode() {
        let bytes = encode_document(&bson_doc! { "radius" => 2.0, "_t" => "circle" }).unwrap();
        let back: Tagged<Shape> = from_slice(&bytes).unwrap();
        assert_eq!(back.0, Shape::Circle { radius: 2.0 });
    }

    #[test]
    fn test_unknown_discriminator() {
        let bytes = encode_document(&bson_doc! {
            "title" => "t",
            "shapes" => vec![Bson::Document(bson_doc! { "_t" => "hexagon" })],
        })
        .unwrap();
        let err = from_slice::<Drawing>(&bytes).unwrap_err();
        assert_eq!(
            err.as_codec(),
            Some(&CodecError::UnknownDiscriminator {
                path: "shapes[0]._t".to_string(),
                value: "hexagon".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_discriminator_is_an_error() {
        let bytes = encode_document(&bson_doc! { "radius" => 1.0 }).unwrap();
        assert!(from_slice::<Tagged<Shape>>(&bytes).is_err());
    }

    #[test]
    fn test_tagged_list_inside_shape() {
        let drawing = Drawing {
            title: "mixed".to_string(),
            shapes: vec![
                Tagged(Shape::Circle { radius: 1.0 }),
                Tagged(Shape::Rect { width: 1, height: 2 }),
            ],
        };
        let back: Drawing = from_slice(&to_vec(&drawing).unwrap()).unwrap();
        assert_eq!(back, drawing);
    }
}
