//! Dynamic attribute value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic attribute value.
///
/// Attributes carry text (names, descriptions, UIDs), integers
/// (instance numbers, grid sizes), floats (slice locations, rescale
/// parameters) and small homogeneous lists (pixel spacing). Values
/// compare with `==` for filtering; float comparison is bitwise, which
/// is what a cache-equality check wants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Text value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// List of text values.
    Strs(Vec<String>),
    /// List of integer values.
    Ints(Vec<i64>),
    /// List of floating-point values.
    Floats(Vec<f64>),
}

impl Value {
    /// Gets this value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Gets this value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Gets this value as a float. Integers convert losslessly enough
    /// for attribute use.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Gets this value as a list of floats, if it is one.
    #[must_use]
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Value::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// Gets this value as a list of strings, if it is one.
    #[must_use]
    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            Value::Strs(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Strs(v) => write!(f, "{}", v.join("\\")),
            Value::Ints(v) => {
                let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", parts.join("\\"))
            }
            Value::Floats(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", parts.join("\\"))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Strs(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Ints(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Floats(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Int(7).as_float(), Some(7.0));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::Str("x".into()).as_int(), None);
    }

    #[test]
    fn display_joins_lists_with_backslash() {
        let v = Value::Floats(vec![1.0, 0.5]);
        assert_eq!(v.to_string(), "1\\0.5");
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from("a"), Value::Str("a".into()));
        assert_eq!(Value::from(3i32), Value::Int(3));
        assert_eq!(Value::from(2.0), Value::Float(2.0));
    }
}
