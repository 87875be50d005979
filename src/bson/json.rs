//! Extended JSON conversion
//!
//! Output follows the relaxed form: numbers, strings and booleans map to
//! plain JSON, everything without a JSON counterpart becomes a `$`-keyed
//! wrapper object (`{"$oid": ...}`, `{"$date": ...}`). Input accepts both
//! the relaxed and the canonical wrappers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, SecondsFormat};
use serde_json::{Map, Number, Value, json};

use super::document::Document;
use super::oid::ObjectId;
use super::path::FieldPath;
use super::value::{Binary, Bson, Regex};
use crate::error::{CodecError, Result, WireError};

impl Bson {
    /// Convert to relaxed Extended JSON
    pub fn into_relaxed_json(self) -> Value {
        match self {
            Bson::Double(f) => match Number::from_f64(f) {
                Some(n) => Value::Number(n),
                None => json!({ "$numberDouble": non_finite_name(f) }),
            },
            Bson::String(s) => Value::String(s),
            Bson::Document(doc) => doc.into_relaxed_json(),
            Bson::Array(items) => Value::Array(items.into_iter().map(Bson::into_relaxed_json).collect()),
            Bson::Binary(bin) => json!({
                "$binary": {
                    "base64": STANDARD.encode(&bin.bytes),
                    "subType": format!("{:02x}", bin.subtype),
                }
            }),
            Bson::Undefined => json!({ "$undefined": true }),
            Bson::ObjectId(id) => json!({ "$oid": id.to_hex() }),
            Bson::Boolean(b) => Value::Bool(b),
            Bson::UtcDateTime(ms) => relaxed_date(ms),
            Bson::Null => Value::Null,
            Bson::Regex(re) => json!({
                "$regularExpression": { "pattern": re.pattern, "options": re.options }
            }),
            Bson::Reference { namespace, id } => json!({
                "$dbPointer": { "$ref": namespace, "$id": { "$oid": id.to_hex() } }
            }),
            Bson::Code(code) => json!({ "$code": code }),
            Bson::Symbol(s) => json!({ "$symbol": s }),
            Bson::ScopedCode { code, scope } => json!({
                "$code": code,
                "$scope": scope.into_relaxed_json(),
            }),
            Bson::Int32(n) => Value::from(n),
            Bson::Timestamp(ts) => json!({
                "$timestamp": { "t": ts >> 32, "i": ts & 0xFFFF_FFFF }
            }),
            Bson::Int64(n) => Value::from(n),
        }
    }

    /// Parse Extended JSON (relaxed or canonical)
    pub fn from_extended_json(value: Value) -> Result<Bson> {
        parse_value(value, &FieldPath::Root)
    }
}

impl Document {
    pub fn into_relaxed_json(self) -> Value {
        let map: Map<String, Value> = self
            .into_iter()
            .map(|(key, value)| (key, value.into_relaxed_json()))
            .collect();
        Value::Object(map)
    }

    /// Parse an Extended JSON object into a document
    ///
    /// # Returns
    /// * `TypeMismatch` when `value` is not a plain JSON object
    pub fn from_extended_json(value: Value) -> Result<Document> {
        let root = FieldPath::Root;
        match parse_value(value, &root)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(CodecError::TypeMismatch {
                path: root.to_string(),
                expected: "Document".to_string(),
                found: other.kind_name().to_string(),
            }
            .into()),
        }
    }
}

fn non_finite_name(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

// ISO-8601 only between 1970 and 9999; everything else keeps the raw millis
fn relaxed_date(ms: i64) -> Value {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) if (1970..=9999).contains(&dt.year()) => {
            json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) })
        }
        _ => json!({ "$date": { "$numberLong": ms.to_string() } }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(path: &FieldPath<'_>, expected: &str, found: impl Into<String>) -> WireError {
    CodecError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.into(),
    }
    .into()
}

fn parse_value(value: Value, path: &FieldPath<'_>) -> Result<Bson> {
    match value {
        Value::Null => Ok(Bson::Null),
        Value::Bool(b) => Ok(Bson::Boolean(b)),
        Value::Number(n) => parse_number(&n, path),
        Value::String(s) => Ok(Bson::String(s)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.into_iter().enumerate() {
                out.push(parse_value(item, &path.index(idx))?);
            }
            Ok(Bson::Array(out))
        }
        Value::Object(map) => parse_object(map, path),
    }
}

fn parse_number(n: &Number, path: &FieldPath<'_>) -> Result<Bson> {
    if let Some(i) = n.as_i64() {
        return Ok(Bson::from(i));
    }
    if n.is_u64() {
        return Err(CodecError::UnsupportedType {
            type_name: format!("u64 value {n}"),
            path: path.to_string(),
        }
        .into());
    }
    n.as_f64()
        .map(Bson::Double)
        .ok_or_else(|| invalid(path, "number", n.to_string()))
}

fn parse_object(mut map: Map<String, Value>, path: &FieldPath<'_>) -> Result<Bson> {
    let wrapper = match map.keys().next() {
        Some(key) if key.starts_with('$') => key.clone(),
        _ => return parse_plain(map, path),
    };

    if map.len() == 2 && map.contains_key("$code") && map.contains_key("$scope") {
        let code = take_str(&mut map, "$code", path)?;
        let scope = match map.remove("$scope") {
            Some(Value::Object(scope)) => match parse_plain(scope, &path.key("$scope"))? {
                Bson::Document(doc) => doc,
                other => return Err(invalid(path, "$scope object", other.kind_name())),
            },
            other => return Err(invalid(path, "$scope object", other.as_ref().map_or("missing", json_kind))),
        };
        return Ok(Bson::ScopedCode { code, scope });
    }

    if map.len() != 1 {
        return parse_plain(map, path);
    }

    let child = path.key(&wrapper);
    let Some(inner) = map.remove(&wrapper) else {
        return Err(invalid(path, "wrapper value", "missing"));
    };
    match wrapper.as_str() {
        "$oid" => match inner {
            Value::String(hex) => Ok(Bson::ObjectId(ObjectId::parse_str(&hex)?)),
            other => Err(invalid(&child, "hex string", json_kind(&other))),
        },
        "$date" => parse_date(inner, &child).map(Bson::UtcDateTime),
        "$numberLong" => parse_long(inner, &child).map(Bson::Int64),
        "$numberInt" => match inner {
            Value::String(s) => s
                .parse::<i32>()
                .map(Bson::Int32)
                .map_err(|_| invalid(&child, "32-bit integer string", s)),
            other => Err(invalid(&child, "string", json_kind(&other))),
        },
        "$numberDouble" => match inner {
            Value::String(s) => parse_double(&s)
                .map(Bson::Double)
                .ok_or_else(|| invalid(&child, "double string", s)),
            other => Err(invalid(&child, "string", json_kind(&other))),
        },
        "$binary" => parse_binary(inner, &child).map(Bson::Binary),
        "$regularExpression" => {
            let mut fields = expect_object(inner, &child)?;
            let pattern = take_str(&mut fields, "pattern", &child)?;
            let options = take_str(&mut fields, "options", &child)?;
            Ok(Bson::Regex(Regex::new(pattern, options)))
        }
        "$timestamp" => {
            let fields = expect_object(inner, &child)?;
            let t = fields.get("t").and_then(Value::as_u64).and_then(|t| u32::try_from(t).ok());
            let i = fields.get("i").and_then(Value::as_u64).and_then(|i| u32::try_from(i).ok());
            match (t, i) {
                (Some(t), Some(i)) => Ok(Bson::Timestamp((u64::from(t) << 32) | u64::from(i))),
                _ => Err(invalid(&child, "{t: u32, i: u32}", "object")),
            }
        }
        "$symbol" => match inner {
            Value::String(s) => Ok(Bson::Symbol(s)),
            other => Err(invalid(&child, "string", json_kind(&other))),
        },
        "$code" => match inner {
            Value::String(s) => Ok(Bson::Code(s)),
            other => Err(invalid(&child, "string", json_kind(&other))),
        },
        "$undefined" => Ok(Bson::Undefined),
        "$dbPointer" => {
            let mut fields = expect_object(inner, &child)?;
            let namespace = take_str(&mut fields, "$ref", &child)?;
            let id = match fields.remove("$id") {
                Some(value) => match parse_value(value, &child.key("$id"))? {
                    Bson::ObjectId(id) => id,
                    other => return Err(invalid(&child, "$id ObjectId", other.kind_name())),
                },
                None => return Err(invalid(&child, "$id ObjectId", "missing")),
            };
            Ok(Bson::Reference { namespace, id })
        }
        _ => {
            map.insert(wrapper.clone(), inner);
            parse_plain(map, path)
        }
    }
}

fn parse_plain(map: Map<String, Value>, path: &FieldPath<'_>) -> Result<Bson> {
    let mut doc = Document::with_capacity(map.len());
    for (key, value) in map {
        let bson = parse_value(value, &path.key(&key))?;
        doc.insert(key, bson);
    }
    Ok(Bson::Document(doc))
}

fn parse_date(inner: Value, path: &FieldPath<'_>) -> Result<i64> {
    match inner {
        Value::String(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| invalid(path, "RFC 3339 date", format!("{text} ({e})"))),
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid(path, "integer millis", n.to_string())),
        Value::Object(mut fields) => match fields.remove("$numberLong") {
            Some(value) => parse_long(value, &path.key("$numberLong")),
            None => Err(invalid(path, "$numberLong", "object")),
        },
        other => Err(invalid(path, "date", json_kind(&other))),
    }
}

fn parse_long(inner: Value, path: &FieldPath<'_>) -> Result<i64> {
    match inner {
        Value::String(s) => s.parse::<i64>().map_err(|_| invalid(path, "64-bit integer string", s)),
        other => Err(invalid(path, "string", json_kind(&other))),
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

fn parse_binary(inner: Value, path: &FieldPath<'_>) -> Result<Binary> {
    let mut fields = expect_object(inner, path)?;
    let encoded = take_str(&mut fields, "base64", path)?;
    let subtype = take_str(&mut fields, "subType", path)?;
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| invalid(path, "base64 payload", e.to_string()))?;
    let subtype = u8::from_str_radix(&subtype, 16).map_err(|_| invalid(path, "hex subtype", subtype.clone()))?;
    Ok(Binary { subtype, bytes })
}

fn expect_object(value: Value, path: &FieldPath<'_>) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(invalid(path, "object", json_kind(&other))),
    }
}

fn take_str(map: &mut Map<String, Value>, key: &str, path: &FieldPath<'_>) -> Result<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(&path.key(key), "string", json_kind(&other))),
        None => Err(invalid(&path.key(key), "string", "missing")),
    }
}
