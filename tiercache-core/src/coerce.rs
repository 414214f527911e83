//! Type-directed value coercion.
//!
//! [`Converter::coerce`] converts a [`Value`] into the requested [`Shape`]
//! without the caller picking a conversion path. Rules, by source category:
//!
//! * primitive and timestamp sources bridge through their canonical string
//!   rendering, except for boolean targets which have a dedicated rule;
//! * a string coerces into a sequence of simple elements by splitting on the
//!   configured delimiter;
//! * sequences, mappings and records recurse element-, key- and field-wise,
//!   reporting the failing position;
//! * a mapping whose only key is the empty string is a transparent wrapper
//!   around its single value.
//!
//! Every other combination fails with [`CoerceError::Unsupported`].

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::CoerceError;
use crate::shape::{RecordSchema, Shape};
use crate::time;
use crate::typed::Coercible;
use crate::value::{Complex, Mapping, RecordValue, Value};

/// Default delimiter for string to sequence coercion.
pub const DEFAULT_SEQUENCE_DELIMITER: &str = "~";

/// Finds the value for a record field name in a mapping.
pub type NameIndexer = for<'a> fn(&'a Mapping, &str) -> Option<&'a Value>;

/// Renders a timestamp as a string.
pub type TimeFormatter = fn(&DateTime<Utc>) -> String;

/// Parses a string produced by the matching [`TimeFormatter`].
pub type TimeParser = fn(&str) -> Result<DateTime<Utc>, String>;

/// Field lookup by exact name.
pub fn exact_name_indexer<'a>(mapping: &'a Mapping, name: &str) -> Option<&'a Value> {
    mapping.get_str(name)
}

/// Field lookup that prefers an exact match, then falls back to comparing
/// Unicode lowercase forms, so `ÉTAT` matches `état`.
pub fn case_insensitive_name_indexer<'a>(mapping: &'a Mapping, name: &str) -> Option<&'a Value> {
    if let Some(found) = mapping.get_str(name) {
        return Some(found);
    }
    let wanted = name.to_lowercase();
    mapping
        .iter()
        .find(|(k, _)| k.as_str().is_some_and(|k| k.to_lowercase() == wanted))
        .map(|(_, v)| v)
}

#[derive(Clone)]
enum Splitter {
    Delimiter(String),
    Custom(fn(&str) -> Vec<String>),
}

/// The coercion engine.
///
/// Cheap to clone. The defaults split sequences on `~`, match record fields
/// by exact name and render timestamps as integer milliseconds.
#[derive(Clone)]
pub struct Converter {
    splitter: Splitter,
    name_indexer: NameIndexer,
    format_time: TimeFormatter,
    parse_time: TimeParser,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            splitter: Splitter::Delimiter(DEFAULT_SEQUENCE_DELIMITER.to_string()),
            name_indexer: exact_name_indexer,
            format_time: time::format_millis,
            parse_time: time::parse_millis,
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let splitter = match &self.splitter {
            Splitter::Delimiter(d) => format!("{:?}", d),
            Splitter::Custom(_) => "custom".to_string(),
        };
        f.debug_struct("Converter")
            .field("splitter", &splitter)
            .finish_non_exhaustive()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split strings into sequences on `delimiter`.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.splitter = Splitter::Delimiter(delimiter.into());
        self
    }

    /// Split strings into sequences with a custom function.
    pub fn with_splitter(mut self, splitter: fn(&str) -> Vec<String>) -> Self {
        self.splitter = Splitter::Custom(splitter);
        self
    }

    pub fn with_name_indexer(mut self, indexer: NameIndexer) -> Self {
        self.name_indexer = indexer;
        self
    }

    pub fn case_insensitive(self) -> Self {
        self.with_name_indexer(case_insensitive_name_indexer)
    }

    pub fn with_time_format(mut self, format: TimeFormatter, parse: TimeParser) -> Self {
        self.format_time = format;
        self.parse_time = parse;
        self
    }

    // ========================================================================
    // TYPED ENTRY POINTS
    // ========================================================================

    /// Convert `source` into a `T`.
    pub fn convert<S: Coercible, T: Coercible>(&self, source: &S) -> Result<T, CoerceError> {
        self.convert_value(source.to_value())
    }

    /// Convert a dynamic value into a `T`.
    pub fn convert_value<T: Coercible>(&self, value: Value) -> Result<T, CoerceError> {
        T::from_value(self.coerce(value, &T::shape())?)
    }

    /// Canonical string rendering of a primitive or timestamp.
    ///
    /// Booleans render as `0`/`1`, floats in their shortest round-trip form,
    /// timestamps through the configured formatter.
    pub fn render_simple(&self, value: &Value) -> Result<String, CoerceError> {
        let text = match value {
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Float32(f) => f.to_string(),
            Value::Complex(c) => c.to_string(),
            Value::String(s) => s.clone(),
            Value::Timestamp(ts) => (self.format_time)(ts),
            Value::Null => {
                return Err(CoerceError::NilSource {
                    to: Shape::String.to_string(),
                })
            }
            other => return Err(CoerceError::unsupported(other.describe(), Shape::String)),
        };
        Ok(text)
    }

    // ========================================================================
    // DYNAMIC ENTRY POINT
    // ========================================================================

    /// Coerce `value` into `shape`.
    pub fn coerce(&self, value: Value, shape: &Shape) -> Result<Value, CoerceError> {
        if *shape == Shape::Any {
            return Ok(value);
        }

        let value = match value {
            Value::Mapping(mapping) => match mapping.into_wrapped() {
                Ok(inner) => return self.coerce(inner, shape),
                Err(mapping) => Value::Mapping(mapping),
            },
            other => other,
        };

        if let Shape::Optional(inner) = shape {
            return match value {
                Value::Null => Ok(Value::Null),
                other => self.coerce(other, inner),
            };
        }

        match (value, shape) {
            (Value::Null, Shape::Sequence(_) | Shape::Mapping(..)) => Ok(Value::Null),
            (Value::Null, _) => Err(CoerceError::NilSource {
                to: shape.to_string(),
            }),
            (Value::Unsupported(type_name), _) => Err(CoerceError::unsupported(
                format!("unsupported {}", type_name),
                shape,
            )),
            (value, shape) if value.is_simple() && shape.is_simple() => {
                self.coerce_simple(value, shape)
            }
            (Value::String(text), Shape::Sequence(element)) => self.split_into(&text, element),
            (Value::Sequence(items), Shape::Sequence(element)) => {
                self.coerce_sequence(items, element)
            }
            (Value::Mapping(mapping), Shape::Mapping(key, value)) => {
                self.coerce_mapping(mapping, key, value)
            }
            (Value::Mapping(mapping), Shape::Record(schema)) => {
                self.mapping_to_record(&mapping, schema)
            }
            (Value::Record(record), Shape::Mapping(key, value)) => {
                match self.flatten(Value::Record(record)) {
                    Value::Mapping(mapping) => self.coerce_mapping(mapping, key, value),
                    other => Err(CoerceError::unsupported(other.describe(), shape)),
                }
            }
            (Value::Record(record), Shape::Record(schema)) => {
                let fields: Mapping = record
                    .into_fields()
                    .into_iter()
                    .map(|(name, v)| (Value::from(name), v))
                    .collect();
                self.mapping_to_record(&fields, schema)
            }
            (value, shape) => Err(CoerceError::unsupported(value.describe(), shape)),
        }
    }

    // ========================================================================
    // SIMPLE VALUES
    // ========================================================================

    fn coerce_simple(&self, value: Value, shape: &Shape) -> Result<Value, CoerceError> {
        match shape {
            Shape::Bool => to_bool(&value).map(Value::Bool),
            Shape::Timestamp => self.to_timestamp(value).map(Value::Timestamp),
            _ => {
                // Non-string targets see a timestamp as its millisecond count.
                let value = match value {
                    Value::Timestamp(ts) if *shape != Shape::String => {
                        Value::Int(ts.timestamp_millis())
                    }
                    other => other,
                };
                let text = self.render_simple(&value)?;
                parse_primitive(&text, shape)
            }
        }
    }

    fn to_timestamp(&self, value: Value) -> Result<DateTime<Utc>, CoerceError> {
        let out_of_range = |n: String| {
            CoerceError::parse(&n, Shape::Timestamp, "millisecond count out of range")
        };
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Int(n) => time::from_millis(n).ok_or_else(|| out_of_range(n.to_string())),
            Value::UInt(n) => i64::try_from(n)
                .ok()
                .and_then(time::from_millis)
                .ok_or_else(|| out_of_range(n.to_string())),
            Value::String(s) => (self.parse_time)(&s)
                .map_err(|reason| CoerceError::parse(&s, Shape::Timestamp, reason)),
            other => Err(CoerceError::unsupported(other.describe(), Shape::Timestamp)),
        }
    }

    // ========================================================================
    // CONTAINERS
    // ========================================================================

    fn split(&self, text: &str) -> Vec<String> {
        match &self.splitter {
            Splitter::Delimiter(delimiter) => text.split(delimiter.as_str()).map(String::from).collect(),
            Splitter::Custom(split) => split(text),
        }
    }

    fn split_into(&self, text: &str, element: &Shape) -> Result<Value, CoerceError> {
        if !element.is_simple() {
            return Err(CoerceError::unsupported(
                "string",
                Shape::sequence(element.clone()),
            ));
        }
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, part)| {
                self.coerce(Value::String(part), element)
                    .map_err(|e| e.at_index(index))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence)
    }

    fn coerce_sequence(&self, items: Vec<Value>, element: &Shape) -> Result<Value, CoerceError> {
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.coerce(item, element).map_err(|e| e.at_index(index)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence)
    }

    fn coerce_mapping(
        &self,
        mapping: Mapping,
        key_shape: &Shape,
        value_shape: &Shape,
    ) -> Result<Value, CoerceError> {
        let mut out = Mapping::with_capacity(mapping.len());
        for (key, value) in mapping {
            let label = self.label(&key);
            let key = self
                .coerce(key, key_shape)
                .map_err(|e| e.at_key(label.clone()))?;
            let value = self
                .coerce(value, value_shape)
                .map_err(|e| e.at_key(label))?;
            out.insert(key, value);
        }
        Ok(Value::Mapping(out))
    }

    fn mapping_to_record(
        &self,
        mapping: &Mapping,
        schema: &RecordSchema,
    ) -> Result<Value, CoerceError> {
        let mut fields = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let Some(found) = (self.name_indexer)(mapping, field.name) else {
                continue;
            };
            let value = self
                .coerce(found.clone(), &field.shape())
                .map_err(|e| e.at_field(field.name))?;
            fields.push((field.name, value));
        }
        Ok(Value::Record(RecordValue::new(schema.name, fields)))
    }

    /// Turn records into string-keyed mappings, recursively.
    fn flatten(&self, value: Value) -> Value {
        match value {
            Value::Record(record) => Value::Mapping(
                record
                    .into_fields()
                    .into_iter()
                    .map(|(name, v)| (Value::from(name), self.flatten(v)))
                    .collect(),
            ),
            Value::Sequence(items) => {
                Value::Sequence(items.into_iter().map(|v| self.flatten(v)).collect())
            }
            Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| {
                        let key = match self.render_simple(&k) {
                            Ok(rendered) if k.is_simple() => Value::String(rendered),
                            _ => k,
                        };
                        (key, self.flatten(v))
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn label(&self, key: &Value) -> String {
        self.render_simple(key).unwrap_or_else(|_| key.describe())
    }
}

// ============================================================================
// PRIMITIVE RULES
// ============================================================================

fn to_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(n) => Ok(*n != 0),
        Value::UInt(n) => Ok(*n != 0),
        Value::Float(f) => Ok(*f != 0.0),
        Value::Float32(f) => Ok(*f != 0.0),
        Value::Complex(c) => Ok(!c.is_zero()),
        Value::Timestamp(ts) => Ok(ts.timestamp_millis() != 0 || ts.timestamp_subsec_nanos() != 0),
        Value::String(s) => parse_bool(s),
        other => Err(CoerceError::unsupported(other.describe(), Shape::Bool)),
    }
}

fn parse_bool(s: &str) -> Result<bool, CoerceError> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CoerceError::parse(s, Shape::Bool, "not a boolean literal")),
    }
}

fn parse_primitive(text: &str, shape: &Shape) -> Result<Value, CoerceError> {
    let fail = |reason: String| CoerceError::parse(text, shape, reason);
    match shape {
        Shape::String => Ok(Value::String(text.to_string())),
        Shape::Bool => parse_bool(text).map(Value::Bool),
        Shape::Int { bits } => parse_signed(text, *bits).map(Value::Int).map_err(fail),
        Shape::UInt { bits } => parse_unsigned(text, *bits).map(Value::UInt).map_err(fail),
        Shape::Float { bits: 32 } => text
            .parse::<f32>()
            .map(Value::Float32)
            .map_err(|e| fail(e.to_string())),
        Shape::Float { .. } => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| fail(e.to_string())),
        Shape::Complex => text.parse::<Complex>().map(Value::Complex).map_err(fail),
        other => Err(CoerceError::unsupported("string", other)),
    }
}

/// Parse an integer with optional sign and `0x`/`0o`/`0b` prefix into the
/// signed range of `bits`.
///
/// A bare leading zero is not an octal prefix: `"017"` parses as 17, not 15.
/// Octal needs the explicit `0o` prefix.
fn parse_signed(text: &str, bits: u32) -> Result<i64, String> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = i128::from(parse_magnitude(digits)?);
    let value = if negative { -magnitude } else { magnitude };
    let bits = bits.clamp(1, 64);
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << (bits - 1)) - 1;
    if value < min || value > max {
        return Err(format!("value out of range for i{}", bits));
    }
    i64::try_from(value).map_err(|e| e.to_string())
}

fn parse_unsigned(text: &str, bits: u32) -> Result<u64, String> {
    if text.starts_with(['+', '-']) {
        return Err("unsigned value cannot carry a sign".to_string());
    }
    let value = parse_magnitude(text)?;
    let bits = bits.clamp(1, 64);
    if bits < 64 && value >> bits != 0 {
        return Err(format!("value out of range for u{}", bits));
    }
    Ok(value)
}

fn parse_magnitude(text: &str) -> Result<u64, String> {
    let (radix, body) = match text.get(..2) {
        Some("0x" | "0X") => (16, &text[2..]),
        Some("0o" | "0O") => (8, &text[2..]),
        Some("0b" | "0B") => (2, &text[2..]),
        _ => (10, text),
    };
    // Underscores are digit separators only after a base prefix.
    let digits = if radix == 10 {
        body.to_string()
    } else {
        body.replace('_', "")
    };
    if !digits.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err("invalid syntax".to_string());
    }
    u64::from_str_radix(&digits, radix).map_err(|e| e.to_string())
}

// ============================================================================
// DEFAULT CONVERTER SHORTCUTS
// ============================================================================

/// [`Converter::coerce`] with the default converter.
pub fn coerce(value: Value, shape: &Shape) -> Result<Value, CoerceError> {
    Converter::default().coerce(value, shape)
}

/// [`Converter::convert`] with the default converter.
pub fn convert<S: Coercible, T: Coercible>(source: &S) -> Result<T, CoerceError> {
    Converter::default().convert(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn converter() -> Converter {
        Converter::default()
    }

    #[test]
    fn test_bool_rule_numbers() {
        let c = converter();
        assert_eq!(c.convert::<i64, bool>(&0), Ok(false));
        assert_eq!(c.convert::<i64, bool>(&33), Ok(true));
        assert_eq!(c.convert::<f64, bool>(&0.0), Ok(false));
        assert_eq!(c.convert::<f64, bool>(&-0.5), Ok(true));
        assert_eq!(c.convert::<Complex, bool>(&Complex::new(0.0, 1.0)), Ok(true));
    }

    #[test]
    fn test_bool_rule_strings() {
        let c = converter();
        assert_eq!(c.convert_value::<bool>("true".into()), Ok(true));
        assert_eq!(c.convert_value::<bool>("F".into()), Ok(false));
        assert_eq!(c.convert_value::<bool>("1".into()), Ok(true));
        assert!(c.convert_value::<bool>("".into()).is_err());
        assert!(c.convert_value::<bool>("33".into()).is_err());
        assert!(c.convert_value::<bool>("yes".into()).is_err());
    }

    #[test]
    fn test_bool_renders_as_digit() {
        let c = converter();
        assert_eq!(c.convert::<bool, String>(&true), Ok("1".to_string()));
        assert_eq!(c.convert::<bool, i32>(&true), Ok(1));
        assert_eq!(c.convert::<bool, f64>(&false), Ok(0.0));
    }

    #[test]
    fn test_primitive_bridge() {
        let c = converter();
        assert_eq!(c.convert_value::<i32>("-42".into()), Ok(-42));
        assert_eq!(c.convert_value::<u8>("0xff".into()), Ok(255));
        assert_eq!(c.convert_value::<i64>("0b1010".into()), Ok(10));
        assert_eq!(c.convert_value::<i64>("0o1_7".into()), Ok(15));
        assert_eq!(c.convert::<f64, i32>(&3.0), Ok(3));
        assert_eq!(c.convert::<i32, f64>(&7), Ok(7.0));
        assert_eq!(c.convert::<f64, String>(&0.1), Ok("0.1".to_string()));
        assert_eq!(c.convert::<f32, String>(&0.1), Ok("0.1".to_string()));
        assert_eq!(
            c.convert_value::<Complex>("(1+2i)".into()),
            Ok(Complex::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_integer_range_and_sign_checks() {
        let c = converter();
        assert!(c.convert_value::<i8>("128".into()).is_err());
        assert_eq!(c.convert_value::<i8>("-128".into()), Ok(-128));
        assert!(c.convert_value::<u32>("-1".into()).is_err());
        assert!(c.convert_value::<u32>("+1".into()).is_err());
        assert!(c.convert_value::<i32>("1_000".into()).is_err());
        assert!(c.convert_value::<i32>("0x".into()).is_err());
        assert!(c.convert_value::<i32>("0x+5".into()).is_err());
        assert!(c.convert::<f64, i32>(&3.5).is_err());
        assert_eq!(c.convert_value::<u64>("18446744073709551615".into()), Ok(u64::MAX));
        assert_eq!(c.convert_value::<i64>("-9223372036854775808".into()), Ok(i64::MIN));
    }

    #[test]
    fn test_timestamp_rules() {
        let c = converter();
        let ts = time::from_millis(1_600_000_000_000).expect("timestamp should be in range");
        assert_eq!(
            c.convert::<DateTime<Utc>, String>(&ts),
            Ok("1600000000000".to_string())
        );
        assert_eq!(c.convert::<DateTime<Utc>, i64>(&ts), Ok(1_600_000_000_000));
        assert_eq!(c.convert_value::<DateTime<Utc>>("1600000000000".into()), Ok(ts));
        assert_eq!(c.convert::<i64, DateTime<Utc>>(&1_600_000_000_000), Ok(ts));
        assert_eq!(c.convert::<DateTime<Utc>, bool>(&ts), Ok(true));
        let epoch = time::from_millis(0).expect("epoch should be in range");
        assert_eq!(c.convert::<DateTime<Utc>, bool>(&epoch), Ok(false));
    }

    #[test]
    fn test_rfc3339_time_format() {
        let c = converter().with_time_format(time::format_rfc3339, time::parse_rfc3339);
        let ts = time::from_millis(0).expect("epoch should be in range");
        assert_eq!(
            c.convert::<DateTime<Utc>, String>(&ts),
            Ok("1970-01-01T00:00:00.000Z".to_string())
        );
        assert_eq!(
            c.convert_value::<DateTime<Utc>>("1970-01-01T00:00:00Z".into()),
            Ok(ts)
        );
    }

    #[test]
    fn test_string_to_sequence() {
        let c = converter();
        assert_eq!(c.convert_value::<Vec<i32>>("1~2~3".into()), Ok(vec![1, 2, 3]));
        assert_eq!(
            c.convert_value::<Vec<String>>("".into()),
            Ok(vec![String::new()])
        );
        let err = c
            .convert_value::<Vec<i32>>("1~x~3".into())
            .expect_err("bad element should fail");
        assert!(matches!(err, CoerceError::AtIndex { index: 1, .. }));
    }

    #[test]
    fn test_string_to_sequence_custom_delimiter() {
        let comma = converter().with_delimiter(",");
        assert_eq!(comma.convert_value::<Vec<u8>>("4,5".into()), Ok(vec![4, 5]));

        let words = converter().with_splitter(|s| s.split_whitespace().map(String::from).collect());
        assert_eq!(
            words.convert_value::<Vec<String>>("a  b".into()),
            Ok(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_string_to_nested_sequence_is_unsupported() {
        let err = converter()
            .convert_value::<Vec<Vec<i32>>>("1~2".into())
            .expect_err("nested elements cannot be split");
        assert!(matches!(err, CoerceError::Unsupported { .. }));
    }

    #[test]
    fn test_sequence_to_sequence_reports_index() {
        let c = converter();
        let source = vec!["1".to_string(), "2".to_string()];
        assert_eq!(c.convert::<Vec<String>, Vec<u16>>(&source), Ok(vec![1, 2]));

        let bad = vec!["1".to_string(), "".to_string(), "oops".to_string()];
        let err = c
            .convert::<Vec<String>, Vec<u16>>(&bad)
            .expect_err("empty element should fail");
        assert!(matches!(err, CoerceError::AtIndex { index: 1, .. }));
    }

    #[test]
    fn test_mapping_to_mapping() {
        let c = converter();
        let mut source = HashMap::new();
        source.insert("1".to_string(), "true".to_string());
        source.insert("2".to_string(), "0".to_string());
        let out: HashMap<i32, bool> = c.convert(&source).expect("conversion should succeed");
        assert_eq!(out.get(&1), Some(&true));
        assert_eq!(out.get(&2), Some(&false));
    }

    #[test]
    fn test_nil_sources() {
        let c = converter();
        assert_eq!(
            c.coerce(Value::Null, &Shape::sequence(Shape::String)),
            Ok(Value::Null)
        );
        assert_eq!(
            c.coerce(Value::Null, &Shape::mapping(Shape::String, Shape::Any)),
            Ok(Value::Null)
        );
        assert_eq!(c.coerce(Value::Null, &Shape::optional(Shape::Bool)), Ok(Value::Null));
        assert!(matches!(
            c.coerce(Value::Null, &Shape::Int { bits: 32 }),
            Err(CoerceError::NilSource { .. })
        ));
        assert_eq!(c.convert_value::<Vec<i32>>(Value::Null), Ok(vec![]));
        assert_eq!(c.convert_value::<Option<i32>>(Value::Null), Ok(None));
    }

    #[test]
    fn test_escape_hatch_unwraps_single_empty_key() {
        let c = converter();
        let wrapped = Value::Mapping(Mapping::wrap("17"));
        assert_eq!(c.convert_value::<i32>(wrapped.clone()), Ok(17));
        assert_eq!(c.coerce(wrapped, &Shape::Any), Ok(Value::Mapping(Mapping::wrap("17"))));

        let nested = Value::Mapping(Mapping::wrap(Mapping::wrap(true)));
        assert_eq!(c.convert_value::<bool>(nested), Ok(true));
    }

    #[test]
    fn test_unsupported_names_both_shapes() {
        let c = converter();
        let err = c
            .coerce(Value::Unsupported("fn()".to_string()), &Shape::String)
            .expect_err("functions are not data");
        let msg = err.to_string();
        assert!(msg.contains("fn()"));
        assert!(msg.contains("string"));

        let err = c
            .coerce(Value::Sequence(vec![Value::Int(1)]), &Shape::Int { bits: 32 })
            .expect_err("sequence to scalar is unsupported");
        let msg = err.to_string();
        assert!(msg.contains("sequence<i64>"));
        assert!(msg.contains("i32"));
    }

    #[test]
    fn test_case_insensitive_indexer() {
        let mapping: Mapping = vec![("NAME", "ada")].into_iter().collect();
        assert!(exact_name_indexer(&mapping, "name").is_none());
        assert_eq!(
            case_insensitive_name_indexer(&mapping, "name"),
            Some(&Value::from("ada"))
        );
    }

    #[test]
    fn test_case_insensitive_indexer_folds_unicode() {
        let mapping: Mapping = vec![("ÉTAT", "ok")].into_iter().collect();
        assert_eq!(
            case_insensitive_name_indexer(&mapping, "état"),
            Some(&Value::from("ok"))
        );
    }

    #[test]
    fn test_leading_zero_is_decimal() {
        let c = converter();
        assert_eq!(c.convert_value::<i32>("017".into()), Ok(17));
        assert_eq!(c.convert_value::<u8>("0o17".into()), Ok(15));
        assert_eq!(c.convert_value::<i64>("-010".into()), Ok(-10));
    }

    #[test]
    fn test_render_simple_rejects_containers() {
        let c = converter();
        assert!(c.render_simple(&Value::Null).is_err());
        assert!(c.render_simple(&Value::Sequence(vec![])).is_err());
        assert_eq!(c.render_simple(&Value::UInt(7)), Ok("7".to_string()));
    }
}
