use super::*;
use crate::error::CodecError;
use crate::{bson_doc, bson_shape};
use std::collections::{HashSet, LinkedList};

fn reference_bytes(doc: &::bson::Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.to_writer(&mut out).unwrap();
    out
}

#[derive(Debug, Default, PartialEq)]
struct DbInfo {
    name: String,
    size_on_disk: i64,
}

bson_shape!(DbInfo {
    "Name" => name,
    "SizeOnDisk" => size_on_disk,
});

#[derive(Debug, Default, PartialEq)]
struct Optionals {
    ratio: Option<f64>,
    count: Option<i32>,
    flag: Option<bool>,
    label: Option<String>,
}

bson_shape!(Optionals {
    "ratio" => ratio,
    "count" => count,
    "flag" => flag,
    "label" => label,
});

#[derive(Debug, Default, PartialEq)]
struct Containers {
    triple: [i32; 3],
    names: Vec<String>,
    chain: LinkedList<i64>,
    unique: HashSet<String>,
}

bson_shape!(Containers {
    "triple" => triple,
    "names" => names,
    "chain" => chain,
    "unique" => unique,
});

#[test]
fn test_db_info_scenario() {
    let info = DbInfo {
        name: "DBTest".to_string(),
        size_on_disk: 42,
    };
    let bytes = encode(&info).unwrap();

    assert_eq!(bytes.len(), 38);
    assert_eq!(&bytes[0..4], &38i32.to_le_bytes());
    assert_eq!(bytes[4], ElementType::String as u8);
    assert_eq!(bytes[21], ElementType::Int32 as u8);
    assert_eq!(bytes[37], 0);

    let back: DbInfo = decode(&bytes).unwrap();
    assert_eq!(back, info);
}

#[test]
fn test_db_info_matches_reference_encoder() {
    let ours = encode(&DbInfo {
        name: "DBTest".to_string(),
        size_on_disk: 42,
    })
    .unwrap();
    let theirs = reference_bytes(&::bson::doc! { "Name": "DBTest", "SizeOnDisk": 42 });
    assert_eq!(ours, theirs);
}

#[test]
fn test_large_size_switches_to_int64() {
    let info = DbInfo {
        name: "big".to_string(),
        size_on_disk: i64::from(i32::MAX) + 1,
    };
    let bytes = encode(&info).unwrap();
    let doc = decode_document(&bytes).unwrap();
    assert_eq!(doc.get("SizeOnDisk"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));

    let theirs = reference_bytes(&::bson::doc! { "Name": "big", "SizeOnDisk": i64::from(i32::MAX) + 1 });
    assert_eq!(bytes, theirs);
}

#[test]
fn test_every_kind_matches_reference_encoder() {
    let id_hex = "507f1f77bcf86cd799439011";
    let id = ObjectId::parse_str(id_hex).unwrap();

    let ours = bson_doc! {
        "double" => -0.25,
        "string" => "héllo",
        "doc" => bson_doc! { "inner" => 1 },
        "array" => vec![Bson::Int32(1), Bson::String("two".to_string())],
        "binary" => Binary { subtype: Binary::USER_DEFINED, bytes: vec![0xde, 0xad] },
        "undefined" => Bson::Undefined,
        "oid" => id,
        "bool" => true,
        "date" => Bson::UtcDateTime(1_700_000_000_123),
        "null" => Bson::Null,
        "regex" => Regex::new("^a.*", "mi"),
        "code" => Bson::Code("function() {}".to_string()),
        "symbol" => Bson::Symbol("sym".to_string()),
        "scoped" => Bson::ScopedCode { code: "x + 1".to_string(), scope: bson_doc! { "x" => 1 } },
        "int32" => i32::MIN,
        "timestamp" => Bson::Timestamp((5u64 << 32) | 9),
        "int64" => Bson::Int64(i64::MIN),
    };

    let theirs = ::bson::doc! {
        "double": -0.25,
        "string": "héllo",
        "doc": { "inner": 1 },
        "array": [1, "two"],
        "binary": ::bson::Binary {
            subtype: ::bson::spec::BinarySubtype::UserDefined(0x80),
            bytes: vec![0xde, 0xad],
        },
        "undefined": ::bson::Bson::Undefined,
        "oid": ::bson::oid::ObjectId::parse_str(id_hex).unwrap(),
        "bool": true,
        "date": ::bson::DateTime::from_millis(1_700_000_000_123),
        "null": ::bson::Bson::Null,
        "regex": ::bson::Regex { pattern: "^a.*".to_string(), options: "im".to_string() },
        "code": ::bson::Bson::JavaScriptCode("function() {}".to_string()),
        "symbol": ::bson::Bson::Symbol("sym".to_string()),
        "scoped": ::bson::Bson::JavaScriptCodeWithScope(::bson::JavaScriptCodeWithScope {
            code: "x + 1".to_string(),
            scope: ::bson::doc! { "x": 1 },
        }),
        "int32": i32::MIN,
        "timestamp": ::bson::Timestamp { time: 5, increment: 9 },
        "int64": i64::MIN,
    };

    let ours_bytes = encode_document(&ours).unwrap();
    let theirs_bytes = reference_bytes(&theirs);
    assert_eq!(ours_bytes, theirs_bytes);

    // and the reference bytes decode to the same value model
    assert_eq!(decode_document(&theirs_bytes).unwrap(), ours);
}

#[test]
fn test_reference_decoder_reads_our_bytes() {
    let bytes = encode(&DbInfo {
        name: "DBTest".to_string(),
        size_on_disk: 7,
    })
    .unwrap();
    let theirs = ::bson::Document::from_reader(&mut bytes.as_slice()).unwrap();
    assert_eq!(theirs.get_str("Name").unwrap(), "DBTest");
    assert_eq!(theirs.get_i32("SizeOnDisk").unwrap(), 7);
}

#[test]
fn test_boundary_values_round_trip() {
    let values = vec![
        Bson::Double(f64::MAX),
        Bson::Double(f64::MIN_POSITIVE),
        Bson::Double(-0.0),
        Bson::Double(f64::INFINITY),
        Bson::String(String::new()),
        Bson::String("\u{1F600} multi-byte".to_string()),
        Bson::Document(Document::new()),
        Bson::Array(Vec::new()),
        Bson::Binary(Binary::generic(Vec::new())),
        Bson::Undefined,
        Bson::ObjectId(ObjectId::EMPTY),
        Bson::ObjectId(ObjectId::from_bytes([0xFF; 12])),
        Bson::Boolean(false),
        Bson::UtcDateTime(i64::MIN),
        Bson::UtcDateTime(i64::MAX),
        Bson::Null,
        Bson::Regex(Regex::new("", "")),
        Bson::Reference {
            namespace: "db.coll".to_string(),
            id: ObjectId::from_bytes([7; 12]),
        },
        Bson::Code(String::new()),
        Bson::Symbol("s".to_string()),
        Bson::ScopedCode {
            code: String::new(),
            scope: Document::new(),
        },
        Bson::Int32(i32::MIN),
        Bson::Int32(i32::MAX),
        Bson::Timestamp(u64::MAX),
        Bson::Int64(i64::MIN),
        Bson::Int64(i64::MAX),
    ];

    for value in values {
        let doc = bson_doc! { "v" => value.clone() };
        let bytes = encode_document(&doc).unwrap();
        let back = decode_document(&bytes).unwrap();
        assert_eq!(back.get("v"), Some(&value), "round trip of {}", value.kind_name());
    }
}

#[test]
fn test_nan_round_trips_as_nan() {
    let bytes = encode_document(&bson_doc! { "v" => f64::NAN }).unwrap();
    let back = decode_document(&bytes).unwrap();
    assert!(back.get("v").and_then(Bson::as_f64).is_some_and(f64::is_nan));
}

#[test]
fn test_nullable_unset_vs_zero() {
    let unset = encode(&Optionals::default()).unwrap();
    assert_eq!(unset, [5, 0, 0, 0, 0]);
    assert_eq!(decode::<Optionals>(&unset).unwrap(), Optionals::default());

    let zero = Optionals {
        ratio: Some(0.0),
        count: Some(0),
        flag: Some(false),
        label: Some(String::new()),
    };
    let bytes = encode(&zero).unwrap();
    let theirs = reference_bytes(&::bson::doc! { "ratio": 0.0, "count": 0, "flag": false, "label": "" });
    assert_eq!(bytes, theirs);
    assert_eq!(decode::<Optionals>(&bytes).unwrap(), zero);
}

#[test]
fn test_nullable_from_reference_bytes() {
    let partial = reference_bytes(&::bson::doc! { "count": 3, "label": ::bson::Bson::Null });
    let back: Optionals = decode(&partial).unwrap();
    assert_eq!(
        back,
        Optionals {
            count: Some(3),
            ..Default::default()
        }
    );
}

#[test]
fn test_forward_compatibility_ignores_extra_fields() {
    let bytes = reference_bytes(&::bson::doc! {
        "Name": "DBTest",
        "Empty": false,
        "SizeOnDisk": 42,
        "Shards": { "a": 1 },
    });
    let info: DbInfo = decode(&bytes).unwrap();
    assert_eq!(
        info,
        DbInfo {
            name: "DBTest".to_string(),
            size_on_disk: 42,
        }
    );
}

#[test]
fn test_container_fields_round_trip() {
    let value = Containers {
        triple: [3, 1, 2],
        names: vec!["b".to_string(), "a".to_string()],
        chain: LinkedList::from([10, 20, 30]),
        unique: HashSet::from(["only".to_string()]),
    };
    let bytes = encode(&value).unwrap();
    let back: Containers = decode(&bytes).unwrap();
    assert_eq!(back, value);
}

#[test]
fn test_three_element_array_into_fixed_array() {
    let bytes = reference_bytes(&::bson::doc! { "triple": [10, 20, 30] });
    let back: Containers = decode(&bytes).unwrap();
    assert_eq!(back.triple, [10, 20, 30]);
}

#[test]
fn test_unsupported_collection_kind() {
    struct Sealed;

    impl CollectionTarget for Sealed {
        type Element = i32;

        fn descriptor() -> CollectionDescriptor {
            CollectionDescriptor::new("Sealed", None)
        }

        fn current_len(&self) -> usize {
            0
        }
    }

    let array = Bson::Array(vec![Bson::Int32(1)]);
    let err = mapping::decode_collection::<Sealed>(array, &FieldPath::Root).err().unwrap();
    assert_eq!(
        err.as_codec(),
        Some(&CodecError::UnsupportedCollectionType {
            type_name: "Sealed".to_string()
        })
    );
}

#[test]
fn test_truncated_reference_bytes() {
    let bytes = reference_bytes(&::bson::doc! { "Name": "DBTest" });
    let err = decode_document(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(
        err.as_codec(),
        Some(CodecError::TruncatedDocument { .. })
    ));
}

#[test]
fn test_encoding_is_deterministic() {
    let info = DbInfo {
        name: "same".to_string(),
        size_on_disk: 1,
    };
    assert_eq!(encode(&info).unwrap(), encode(&info).unwrap());
}

#[test]
fn test_wide_document_decodes_in_linear_time() {
    let wide: Document = (0..60_000).map(|i| (format!("f{i}"), Bson::Int32(i))).collect();
    let bytes = encode_document(&wide).unwrap();

    let started = std::time::Instant::now();
    let back = decode_document(&bytes).unwrap();
    let info: DbInfo = decode(&bytes).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(back.len(), 60_000);
    assert_eq!(back.get_i32("f59999"), Some(59_999));
    assert_eq!(info, DbInfo::default());
    assert!(elapsed < std::time::Duration::from_secs(5), "wide decode took {elapsed:?}");
}
