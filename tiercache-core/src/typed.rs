//! Typed boundary between Rust values and the dynamic [`Value`] model.
//!
//! [`Coercible`] replaces runtime reflection: each type states its target
//! [`Shape`] and how to move in and out of a [`Value`]. Records get their
//! field list from the [`cache_record!`](crate::cache_record) macro.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoerceError;
use crate::shape::Shape;
use crate::value::{Complex, Mapping, Value};

/// A type that can travel through the coercion engine.
///
/// `from_value` receives a value already coerced into `Self::shape()`; use
/// [`Converter::convert_value`](crate::Converter::convert_value) for arbitrary
/// input.
pub trait Coercible: Sized {
    fn shape() -> Shape;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, CoerceError>;
}

fn mismatch(value: &Value, shape: Shape) -> CoerceError {
    CoerceError::unsupported(value.describe(), shape)
}

// ============================================================================
// PRIMITIVES
// ============================================================================

impl Coercible for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

macro_rules! coercible_int {
    ($variant:ident, $wide:ty, $shape:ident; $($t:ty),*) => {
        $(
            impl Coercible for $t {
                fn shape() -> Shape {
                    Shape::$shape { bits: <$t>::BITS }
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self as $wide)
                }

                fn from_value(value: Value) -> Result<Self, CoerceError> {
                    let out_of_range =
                        |n: String| CoerceError::parse(&n, Self::shape(), "out of range");
                    match value {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| out_of_range(n.to_string())),
                        Value::UInt(n) => <$t>::try_from(n).map_err(|_| out_of_range(n.to_string())),
                        other => Err(mismatch(&other, Self::shape())),
                    }
                }
            }
        )*
    };
}

coercible_int!(Int, i64, Int; i8, i16, i32, i64, isize);
coercible_int!(UInt, u64, UInt; u8, u16, u32, u64, usize);

impl Coercible for f64 {
    fn shape() -> Shape {
        Shape::Float { bits: 64 }
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Float32(f) => Ok(f64::from(f)),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

impl Coercible for f32 {
    fn shape() -> Shape {
        Shape::Float { bits: 32 }
    }

    fn to_value(&self) -> Value {
        Value::Float32(*self)
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Float32(f) => Ok(f),
            Value::Float(f) => Ok(f as f32),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

impl Coercible for Complex {
    fn shape() -> Shape {
        Shape::Complex
    }

    fn to_value(&self) -> Value {
        Value::Complex(*self)
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Complex(c) => Ok(c),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

impl Coercible for String {
    fn shape() -> Shape {
        Shape::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

impl Coercible for DateTime<Utc> {
    fn shape() -> Shape {
        Shape::Timestamp
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

/// UUIDs travel as their hyphenated string form.
impl Coercible for Uuid {
    fn shape() -> Shape {
        Shape::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => {
                Uuid::parse_str(&s).map_err(|e| CoerceError::parse(&s, "uuid", e))
            }
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

impl Coercible for Value {
    fn shape() -> Shape {
        Shape::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        Ok(value)
    }
}

// ============================================================================
// CONTAINERS
// ============================================================================

/// Nil converts to an empty vector.
impl<T: Coercible> Coercible for Vec<T> {
    fn shape() -> Shape {
        Shape::sequence(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(Coercible::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| T::from_value(item).map_err(|e| e.at_index(index)))
                .collect(),
            other => Err(mismatch(&other, Self::shape())),
        }
    }
}

fn mapping_entries<K: Coercible, V: Coercible>(
    value: Value,
    shape: impl FnOnce() -> Shape,
) -> Result<Vec<(K, V)>, CoerceError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(mapping) => mapping
            .into_iter()
            .map(|(k, v)| {
                let label = k.as_str().map(str::to_string).unwrap_or_else(|| k.describe());
                let key = K::from_value(k).map_err(|e| e.at_key(label.clone()))?;
                let value = V::from_value(v).map_err(|e| e.at_key(label))?;
                Ok((key, value))
            })
            .collect(),
        other => Err(mismatch(&other, shape())),
    }
}

fn mapping_value<'a, K: Coercible + 'a, V: Coercible + 'a>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Value {
    Value::Mapping(entries.map(|(k, v)| (k.to_value(), v.to_value())).collect::<Mapping>())
}

/// Nil converts to an empty map.
impl<K, V> Coercible for HashMap<K, V>
where
    K: Coercible + Eq + Hash,
    V: Coercible,
{
    fn shape() -> Shape {
        Shape::mapping(K::shape(), V::shape())
    }

    fn to_value(&self) -> Value {
        mapping_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        Ok(mapping_entries(value, Self::shape)?.into_iter().collect())
    }
}

/// Nil converts to an empty map.
impl<K, V> Coercible for BTreeMap<K, V>
where
    K: Coercible + Ord,
    V: Coercible,
{
    fn shape() -> Shape {
        Shape::mapping(K::shape(), V::shape())
    }

    fn to_value(&self) -> Value {
        mapping_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        Ok(mapping_entries(value, Self::shape)?.into_iter().collect())
    }
}

// ============================================================================
// INDIRECTION
// ============================================================================

impl<T: Coercible> Coercible for Option<T> {
    fn shape() -> Shape {
        Shape::optional(T::shape())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Coercible> Coercible for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        T::from_value(value).map(Box::new)
    }
}

impl<T: Coercible> Coercible for Arc<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        T::from_value(value).map(Arc::new)
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// Declare a struct and make it [`Coercible`] as a record.
///
/// The struct must implement `Default`: fields absent from the source keep
/// their default value.
///
/// ```
/// use tiercache_core::{cache_record, convert};
///
/// cache_record! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct User {
///         pub name: String,
///         pub age: i32,
///     }
/// }
///
/// let user = User { name: "ada".to_string(), age: 36 };
/// let copy: User = convert(&user).expect("record clone should succeed");
/// assert_eq!(copy, user);
/// ```
#[macro_export]
macro_rules! cache_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $field_ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $field_ty,
            )*
        }

        impl $crate::Coercible for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Record($crate::RecordSchema::new(
                    stringify!($name),
                    vec![
                        $(
                            $crate::FieldSchema::new(
                                stringify!($field),
                                <$field_ty as $crate::Coercible>::shape,
                            ),
                        )*
                    ],
                ))
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Record($crate::RecordValue::new(
                    stringify!($name),
                    vec![
                        $(
                            (stringify!($field), $crate::Coercible::to_value(&self.$field)),
                        )*
                    ],
                ))
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(
                value: $crate::Value,
            ) -> ::std::result::Result<Self, $crate::CoerceError> {
                let record = match value {
                    $crate::Value::Record(record) => record,
                    other => {
                        return Err($crate::CoerceError::Unsupported {
                            from: other.describe(),
                            to: <Self as $crate::Coercible>::shape().to_string(),
                        })
                    }
                };
                let mut out = <Self as ::std::default::Default>::default();
                for (field, value) in record.into_fields() {
                    $(
                        if field == stringify!($field) {
                            out.$field = <$field_ty as $crate::Coercible>::from_value(value)
                                .map_err(|e| e.at_field(field))?;
                            continue;
                        }
                    )*
                }
                Ok(out)
            }
        }
    };
}
