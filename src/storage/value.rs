//! Typed values for FlatDB
//!
//! Stored fields are strings. A `Value` is what a literal or a sort key looks
//! like once it carries a semantic type.

use std::cmp::Ordering;
use std::fmt;

use crate::catalog::ValueType;
use crate::error::{Error, Result};

/// A typed literal value
#[derive(Debug, Clone)]
pub enum Value {
    /// String value
    String(String),
    /// Integer value (64-bit)
    Integer(i64),
    /// Float value (64-bit)
    Float(f64),
}

impl Value {
    /// Get the semantic type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
        }
    }

    /// Parse a raw stored field as the given type
    pub fn parse(raw: &str, ty: ValueType) -> Result<Value> {
        let failure = || Error::CoercionFailure {
            value: raw.to_string(),
            to: ty.name(),
        };
        match ty {
            ValueType::String => Ok(Value::String(raw.to_string())),
            ValueType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| failure()),
            ValueType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| failure()),
        }
    }

    /// Parse a raw stored field as the same type as this value
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        Value::parse(raw, self.value_type())
    }

    /// Compare as a predicate does: floats follow IEEE rules, so `-0 == 0`
    /// and NaN is unordered against everything. `Ord` is the total order used
    /// for sort keys.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            _ => Some(self.cmp(other)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Values of different kinds order by kind: string < integer < float.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_to_literal_type() {
        assert_eq!(Value::from(5).coerce("13").unwrap(), Value::Integer(13));
        assert_eq!(Value::from(1.5).coerce("2.25").unwrap(), Value::Float(2.25));
        assert_eq!(
            Value::from("x").coerce("013").unwrap(),
            Value::String("013".to_string())
        );
    }

    #[test]
    fn test_coercion_failure() {
        let err = Value::from(5).coerce("razor-leaf").unwrap_err();
        assert!(matches!(
            err,
            Error::CoercionFailure { ref value, to: "INTEGER" } if value == "razor-leaf"
        ));
    }

    #[test]
    fn test_ordering() {
        assert!(Value::from(2) < Value::from(10));
        assert!(Value::from("10") < Value::from("2"));
        assert!(Value::from(-0.5) < Value::from(0.25));
        assert!(Value::from("zzz") < Value::from(0));
        assert!(Value::from(100) < Value::from(0.0));
        assert!(Value::from(f64::INFINITY) < Value::from(f64::NAN));
    }

    #[test]
    fn test_compare_floats_by_ieee_rules() {
        assert_eq!(Value::from(-0.0).compare(&Value::from(0.0)), Some(Ordering::Equal));
        assert_eq!(Value::from(f64::NAN).compare(&Value::from(f64::NAN)), None);
        assert_eq!(Value::from(1.0).compare(&Value::from(f64::NAN)), None);
        assert_eq!(Value::from(3).compare(&Value::from(4)), Some(Ordering::Less));
    }
}
