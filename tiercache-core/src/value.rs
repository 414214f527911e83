//! Dynamic value model.
//!
//! Every value entering the coercion engine is represented as a [`Value`] and
//! classified exactly once into a [`Category`]. Downstream logic dispatches on
//! that tag instead of probing types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

// ============================================================================
// CATEGORY
// ============================================================================

/// Semantic category of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Absent value (nil).
    Nil,
    /// Boolean, integer, floating point, complex or string.
    Primitive,
    /// Absolute instant.
    Timestamp,
    /// Ordered, homogeneous collection.
    Sequence,
    /// Unique keys, one value per key.
    Mapping,
    /// Fixed named fields.
    Record,
    /// Non-data value (function, channel, handle, ...).
    Unsupported,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "nil",
            Self::Primitive => "primitive",
            Self::Timestamp => "timestamp",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Record => "record",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// Tagged dynamic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Single precision float, kept apart so it renders in its own shortest form.
    Float32(f32),
    Complex(Complex),
    String(String),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Record(RecordValue),
    /// A non-data value, carrying the name of its type for error messages.
    Unsupported(String),
}

impl Value {
    /// Classify this value.
    pub fn category(&self) -> Category {
        match self {
            Self::Null => Category::Nil,
            Self::Bool(_)
            | Self::Int(_)
            | Self::UInt(_)
            | Self::Float(_)
            | Self::Float32(_)
            | Self::Complex(_)
            | Self::String(_) => Category::Primitive,
            Self::Timestamp(_) => Category::Timestamp,
            Self::Sequence(_) => Category::Sequence,
            Self::Mapping(_) => Category::Mapping,
            Self::Record(_) => Category::Record,
            Self::Unsupported(_) => Category::Unsupported,
        }
    }

    /// True for primitives and timestamps, the values that have a canonical
    /// string rendering.
    pub fn is_simple(&self) -> bool {
        matches!(self.category(), Category::Primitive | Category::Timestamp)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Short description of the runtime shape, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "nil".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "i64".to_string(),
            Self::UInt(_) => "u64".to_string(),
            Self::Float(_) => "f64".to_string(),
            Self::Float32(_) => "f32".to_string(),
            Self::Complex(_) => "complex".to_string(),
            Self::String(_) => "string".to_string(),
            Self::Timestamp(_) => "timestamp".to_string(),
            Self::Sequence(items) => match items.first() {
                Some(first) => format!("sequence<{}>", first.describe()),
                None => "sequence".to_string(),
            },
            Self::Mapping(_) => "mapping".to_string(),
            Self::Record(record) => format!("record {}", record.name()),
            Self::Unsupported(type_name) => format!("unsupported {}", type_name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Mapping> for Value {
    fn from(v: Mapping) -> Self {
        Self::Mapping(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Sequence(v)
    }
}

// ============================================================================
// MAPPING
// ============================================================================

/// Collection of unique keys, each associated with one value.
///
/// Keys may be any [`Value`]; inserting a key equal to an existing one
/// replaces its value. Equality ignores insertion order.
///
/// Entries keep insertion order. Scalar keys are also indexed by a hashable
/// form so lookups and inserts are constant time; container and NaN keys
/// fall back to a linear scan.
#[derive(Clone, Default)]
pub struct Mapping {
    entries: Vec<(Value, Value)>,
    index: HashMap<IndexKey, usize>,
}

/// Hashable form of a scalar key. Two keys with equal `IndexKey`s are equal
/// values and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Float32(u32),
    Complex(u64, u64),
    String(String),
    Timestamp(DateTime<Utc>),
}

// -0.0 == 0.0, so both share one index slot. NaN never equals anything.
fn f64_slot(f: f64) -> Option<u64> {
    match f {
        f if f.is_nan() => None,
        f if f == 0.0 => Some(0),
        f => Some(f.to_bits()),
    }
}

fn f32_slot(f: f32) -> Option<u32> {
    match f {
        f if f.is_nan() => None,
        f if f == 0.0 => Some(0),
        f => Some(f.to_bits()),
    }
}

impl IndexKey {
    fn of(value: &Value) -> Option<Self> {
        let key = match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(n) => Self::Int(*n),
            Value::UInt(n) => Self::UInt(*n),
            Value::Float(f) => Self::Float(f64_slot(*f)?),
            Value::Float32(f) => Self::Float32(f32_slot(*f)?),
            Value::Complex(c) => Self::Complex(f64_slot(c.re)?, f64_slot(c.im)?),
            Value::String(s) => Self::String(s.clone()),
            Value::Timestamp(ts) => Self::Timestamp(*ts),
            Value::Sequence(_) | Value::Mapping(_) | Value::Record(_) | Value::Unsupported(_) => {
                return None
            }
        };
        Some(key)
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    fn position(&self, key: &Value) -> Option<usize> {
        match IndexKey::of(key) {
            Some(indexed) => self.index.get(&indexed).copied(),
            None => self.entries.iter().position(|(k, _)| k == key),
        }
    }

    /// Insert an entry, returning the previous value for an equal key.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let indexed = IndexKey::of(&key);
        let existing = match &indexed {
            Some(indexed) => self.index.get(indexed).copied(),
            None => self.entries.iter().position(|(k, _)| *k == key),
        };
        match existing {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                if let Some(indexed) = indexed {
                    self.index.insert(indexed, self.entries.len());
                }
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.position(key).map(|pos| &self.entries[pos].1)
    }

    /// Look up a string key. Non-string keys never match.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.index
            .get(&IndexKey::String(key.to_string()))
            .map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Unwrap the escape-hatch form: exactly one entry whose key is the empty
    /// string. Returns the mapping unchanged when it is not in that form.
    pub fn into_wrapped(mut self) -> Result<Value, Mapping> {
        let is_wrapper = self.entries.len() == 1 && self.entries[0].0.as_str() == Some("");
        if is_wrapper {
            if let Some((_, inner)) = self.entries.pop() {
                return Ok(inner);
            }
        }
        Err(self)
    }

    /// Build the escape-hatch wrapper around a single opaque value.
    pub fn wrap(value: impl Into<Value>) -> Self {
        let mut mapping = Self::with_capacity(1);
        mapping.insert("", value);
        mapping
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl IntoIterator for Mapping {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut mapping = Self::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// Instance of a record: a named type with fixed, independently typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    name: &'static str,
    fields: Vec<(&'static str, Value)>,
}

impl RecordValue {
    pub fn new(name: &'static str, fields: Vec<(&'static str, Value)>) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, v)| (*name, v))
    }

    pub fn into_fields(self) -> Vec<(&'static str, Value)> {
        self.fields
    }
}

// ============================================================================
// COMPLEX
// ============================================================================

/// Complex number, formatted as `(re+imi)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}{:+}i)", self.re, self.im)
    }
}

impl FromStr for Complex {
    type Err = String;

    /// Accepts `(re+imi)`, `re+imi`, a bare real part `re`, or a bare
    /// imaginary part `imi`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = match trimmed.strip_prefix('(') {
            Some(rest) => rest
                .strip_suffix(')')
                .ok_or_else(|| "unbalanced parenthesis".to_string())?,
            None => trimmed,
        };
        if body.is_empty() {
            return Err("empty input".to_string());
        }

        let Some(without_i) = body.strip_suffix('i') else {
            let re = parse_part(body)?;
            return Ok(Self::new(re, 0.0));
        };

        // The imaginary part starts at the last sign that is neither leading
        // nor part of an exponent.
        let bytes = without_i.as_bytes();
        let split = (1..bytes.len())
            .rev()
            .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

        match split {
            Some(at) => {
                let re = parse_part(&without_i[..at])?;
                let im = parse_imaginary(&without_i[at..])?;
                Ok(Self::new(re, im))
            }
            None => Ok(Self::new(0.0, parse_imaginary(without_i)?)),
        }
    }
}

fn parse_part(s: &str) -> Result<f64, String> {
    s.parse::<f64>().map_err(|e| format!("{}: {:?}", e, s))
}

fn parse_imaginary(s: &str) -> Result<f64, String> {
    match s {
        "" | "+" => Ok(1.0),
        "-" => Ok(-1.0),
        _ => parse_part(s),
    }
}
