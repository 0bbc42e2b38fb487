//! Property values and property slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    /// Canonical, type-tagged string used as the value-index key.
    ///
    /// `Str("3")` and `Int(3)` index under different keys: lookups are exact.
    pub fn index_key(&self) -> String {
        match self {
            Value::Str(s) => format!("s:{s}"),
            Value::Int(i) => format!("i:{i}"),
            Value::Float(f) => format!("f:{}", f.to_bits()),
            Value::Bool(b) => format!("b:{b}"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
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

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// What a node holds under one property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertySlot {
    Single(Value),
    Many(Vec<Value>),
}

impl PropertySlot {
    pub fn values(&self) -> &[Value] {
        match self {
            PropertySlot::Single(v) => std::slice::from_ref(v),
            PropertySlot::Many(vs) => vs,
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values().contains(value)
    }

    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl fmt::Display for PropertySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertySlot::Single(v) => write!(f, "{v}"),
            PropertySlot::Many(vs) => {
                f.write_str("[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keys_are_type_tagged() {
        assert_ne!(Value::from("3").index_key(), Value::Int(3).index_key());
        assert_eq!(Value::from("x").index_key(), Value::from("x".to_string()).index_key());
    }

    #[test]
    fn slot_display() {
        let slot = PropertySlot::Many(vec!["a".into(), "b".into()]);
        assert_eq!(slot.to_string(), "[a|b]");
        assert_eq!(PropertySlot::Single(Value::Bool(true)).to_string(), "true");
    }
}
