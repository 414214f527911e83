//! JSON payload encoding for network stores.
//!
//! Values are written as self-describing JSON and reshaped by the coercion
//! engine on read, so the stored form only has to preserve data, not types:
//! timestamps become integer milliseconds, complex numbers their `(re+imi)`
//! string, records plain objects.

use serde_json::{Map, Number, Value as Json};
use tiercache_core::{CacheError, CacheResult, CoerceError, Converter, Mapping, Value};

const CODEC: &str = "json";

/// Serialize `value` to a JSON payload.
pub fn encode_payload(converter: &Converter, value: &Value) -> CacheResult<String> {
    let json = to_json(converter, value)?;
    serde_json::to_string(&json).map_err(|e| CacheError::backend(CODEC, e))
}

/// Parse a JSON payload back into a dynamic value.
pub fn decode_payload(payload: &str) -> CacheResult<Value> {
    let json: Json = serde_json::from_str(payload).map_err(|e| CacheError::backend(CODEC, e))?;
    Ok(from_json(json))
}

fn unsupported(value: &Value) -> CacheError {
    CoerceError::Unsupported {
        from: value.describe(),
        to: "json payload".to_string(),
    }
    .into()
}

fn float(value: &Value, f: f64) -> CacheResult<Json> {
    Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| unsupported(value))
}

fn to_json(converter: &Converter, value: &Value) -> CacheResult<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number((*n).into()),
        Value::UInt(n) => Json::Number((*n).into()),
        Value::Float(f) => float(value, *f)?,
        // Use the shortest f32 rendering so 0.1f32 stays 0.1.
        Value::Float32(f) => float(value, f.to_string().parse().unwrap_or(f64::from(*f)))?,
        Value::Complex(c) => Json::String(c.to_string()),
        Value::String(s) => Json::String(s.clone()),
        Value::Timestamp(ts) => Json::Number(ts.timestamp_millis().into()),
        Value::Sequence(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(converter, item))
                .collect::<CacheResult<_>>()?,
        ),
        Value::Mapping(mapping) => Json::Object(object(converter, mapping)?),
        Value::Record(record) => Json::Object(
            record
                .fields()
                .map(|(name, field)| Ok((name.to_string(), to_json(converter, field)?)))
                .collect::<CacheResult<_>>()?,
        ),
        Value::Unsupported(_) => return Err(unsupported(value)),
    };
    Ok(json)
}

fn object(converter: &Converter, mapping: &Mapping) -> CacheResult<Map<String, Json>> {
    mapping
        .iter()
        .map(|(key, value)| {
            let key = match key {
                Value::String(s) => s.clone(),
                other if other.is_simple() => converter.render_simple(other)?,
                other => return Err(unsupported(other)),
            };
            Ok((key, to_json(converter, value)?))
        })
        .collect()
}

fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Sequence(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (Value::String(k), from_json(v)))
                .collect(),
        ),
    }
}
