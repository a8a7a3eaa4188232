//! Value cells: the dynamically typed units of a decoded document tree.
//!
//! A [`Value`] is a closed tagged union. Typed reads go through the
//! [`Scalar`] trait and never widen, narrow, or coerce: an `Int32` cell read
//! as `i64` is a kind mismatch, not a conversion.
use std::fmt;

use crate::keymap::KeyMap;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Absent,
    String(String),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Real(f64),
    Object(KeyMap),
    Array(Vec<Value>),
}

/// The tag of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Absent,
    String,
    Int32,
    Int64,
    Bool,
    Real,
    Object,
    Array,
}

/// Rust types that can be stored in, and read back from, a scalar cell.
pub trait Scalar: Clone + PartialEq + Sized {
    const KIND: ValueKind;
    fn from_value(value: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Absent => ValueKind::Absent,
            Self::String(_) => ValueKind::String,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Bool(_) => ValueKind::Bool,
            Self::Real(_) => ValueKind::Real,
            Self::Object(_) => ValueKind::Object,
            Self::Array(_) => ValueKind::Array,
        }
    }
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
    pub fn as_object(&self) -> Option<&KeyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(xs) => Some(xs),
            _ => None,
        }
    }
    /// Strict typed read of a scalar cell.
    pub fn extract<T: Scalar>(&self) -> Option<T> {
        T::from_value(self)
    }
    /// Strict typed read of an array of scalars. Fails if any element has
    /// another kind.
    pub fn extract_array<T: Scalar>(&self) -> Option<Vec<T>> {
        self.as_array()?.iter().map(T::from_value).collect()
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::Real => "real",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

impl Scalar for String {
    const KIND: ValueKind = ValueKind::String;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(x) => Some(x.clone()),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl Scalar for i32 {
    const KIND: ValueKind = ValueKind::Int32;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(x) => Some(*x),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Int32(self)
    }
}

impl Scalar for i64 {
    const KIND: ValueKind = ValueKind::Int64;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int64(x) => Some(*x),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Int64(self)
    }
}

impl Scalar for bool {
    const KIND: ValueKind = ValueKind::Bool;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(x) => Some(*x),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Scalar for f64 {
    const KIND: ValueKind = ValueKind::Real;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

// ---- Conversions ----

impl From<String> for Value {
    fn from(x: String) -> Self { Value::String(x) }
}
impl From<&str> for Value {
    fn from(x: &str) -> Self { Value::String(x.to_owned()) }
}
impl From<i32> for Value {
    fn from(x: i32) -> Self { Value::Int32(x) }
}
impl From<i64> for Value {
    fn from(x: i64) -> Self { Value::Int64(x) }
}
impl From<bool> for Value {
    fn from(x: bool) -> Self { Value::Bool(x) }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::Real(x) }
}
impl From<KeyMap> for Value {
    fn from(x: KeyMap) -> Self { Value::Object(x) }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(xs: Vec<T>) -> Self {
        Value::Array(xs.into_iter().map(Into::into).collect())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_never_widens_or_coerces() {
        assert_eq!(Value::Int32(7).extract::<i32>(), Some(7));
        assert_eq!(Value::Int32(7).extract::<i64>(), None);
        assert_eq!(Value::Int64(7).extract::<i32>(), None);
        assert_eq!(Value::Int32(7).extract::<f64>(), None);
        assert_eq!(Value::from("7").extract::<i32>(), None);
        assert_eq!(Value::Absent.extract::<String>(), None);
    }

    #[test]
    fn array_extraction_requires_uniform_elements() {
        let good = Value::from(vec![1, 2, 3]);
        assert_eq!(good.extract_array::<i32>(), Some(vec![1, 2, 3]));
        let mixed = Value::Array(vec![Value::Int32(1), Value::Int64(2)]);
        assert_eq!(mixed.extract_array::<i32>(), None);
        assert_eq!(Value::Int32(1).extract_array::<i32>(), None);
    }
}
