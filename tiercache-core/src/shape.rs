//! Coercion targets.
//!
//! A [`Shape`] describes the destination of a coercion: its category and,
//! for containers and records, the shapes needed to recurse.

use std::fmt;

/// Destination shape of a coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Accept the source as-is.
    Any,
    Bool,
    Int { bits: u32 },
    UInt { bits: u32 },
    Float { bits: u32 },
    Complex,
    String,
    Timestamp,
    Sequence(Box<Shape>),
    Mapping(Box<Shape>, Box<Shape>),
    Record(RecordSchema),
    /// Nil-able destination. Nil stays nil, anything else coerces to the inner shape.
    Optional(Box<Shape>),
}

impl Shape {
    pub fn sequence(element: Shape) -> Self {
        Self::Sequence(Box::new(element))
    }

    pub fn mapping(key: Shape, value: Shape) -> Self {
        Self::Mapping(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Shape) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Strip every `Optional` layer.
    pub fn innermost(&self) -> &Shape {
        match self {
            Self::Optional(inner) => inner.innermost(),
            other => other,
        }
    }

    /// Primitive or timestamp, after stripping indirection.
    pub fn is_simple(&self) -> bool {
        matches!(
            self.innermost(),
            Self::Bool
                | Self::Int { .. }
                | Self::UInt { .. }
                | Self::Float { .. }
                | Self::Complex
                | Self::String
                | Self::Timestamp
        )
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Int { bits } => write!(f, "i{}", bits),
            Self::UInt { bits } => write!(f, "u{}", bits),
            Self::Float { bits } => write!(f, "f{}", bits),
            Self::Complex => f.write_str("complex"),
            Self::String => f.write_str("string"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Sequence(elem) => write!(f, "sequence<{}>", elem),
            Self::Mapping(key, value) => write!(f, "mapping<{}, {}>", key, value),
            Self::Record(schema) => write!(f, "record {}", schema.name),
            Self::Optional(inner) => write!(f, "optional<{}>", inner),
        }
    }
}

/// Field list of a record type.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn new(name: &'static str, fields: Vec<FieldSchema>) -> Self {
        Self { name, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// Schemas are identified by name and field names; field shapes are lazy
// and may refer back to the record itself.
impl PartialEq for RecordSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name)
    }
}

/// One named field and the shape its value coerces into.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub shape: fn() -> Shape,
}

impl FieldSchema {
    pub const fn new(name: &'static str, shape: fn() -> Shape) -> Self {
        Self { name, shape }
    }

    pub fn shape(&self) -> Shape {
        (self.shape)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::Int { bits: 32 }.to_string(), "i32");
        assert_eq!(Shape::sequence(Shape::String).to_string(), "sequence<string>");
        assert_eq!(
            Shape::mapping(Shape::String, Shape::Float { bits: 64 }).to_string(),
            "mapping<string, f64>"
        );
        let schema = RecordSchema::new("User", vec![]);
        assert_eq!(Shape::Record(schema).to_string(), "record User");
    }

    #[test]
    fn test_is_simple_strips_optional() {
        assert!(Shape::optional(Shape::optional(Shape::Timestamp)).is_simple());
        assert!(!Shape::sequence(Shape::Bool).is_simple());
        assert!(!Shape::Any.is_simple());
    }

    #[test]
    fn test_record_schema_equality_by_names() {
        let a = RecordSchema::new("User", vec![FieldSchema::new("name", || Shape::String)]);
        let b = RecordSchema::new("User", vec![FieldSchema::new("name", || Shape::Bool)]);
        let c = RecordSchema::new("User", vec![FieldSchema::new("age", || Shape::String)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.field("name").is_some());
        assert!(a.field("age").is_none());
    }
}
