use std::cmp::Ordering;
use std::fmt;

use super::condition::CompareOp;

/// Supported scalar types for facts, constants, and action values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit floating-point number.
    Float,
    /// A boolean value.
    Bool,
    /// A UTF-8 string.
    String,
}

impl ValueType {
    /// Parse the document-level type name (`"int"`, `"float"`, `"string"`, `"bool"`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "bool" => Some(ValueType::Bool),
            "string" => Some(ValueType::String),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::String => write!(f, "string"),
        }
    }
}

/// A tagged scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
}

impl Value {
    /// The type tag of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
        }
    }

    /// Compare this value to another of the same type using the given operator.
    /// Returns `None` for cross-type comparisons or operators that do not
    /// apply to the type (e.g. `Lt` on bools, `Contains` on ints).
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => match op {
                CompareOp::Eq => Some(a == b),
                CompareOp::Neq => Some(a != b),
                CompareOp::Contains => Some(a.contains(b.as_str())),
                CompareOp::NotContains => Some(!a.contains(b.as_str())),
                _ => None,
            },
            (Value::Bool(a), Value::Bool(b)) => match op {
                CompareOp::Eq => Some(a == b),
                CompareOp::Neq => Some(a != b),
                _ => None,
            },
            (Value::Int(a), Value::Int(b)) => ordered(op, a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => ordered(op, a.partial_cmp(b)?),
            _ => None,
        }
    }

    /// Total order across all values: type tags first (declaration order),
    /// then values within a type. Floats are ordered with `total_cmp` so the
    /// order stays total even for NaN.
    #[must_use]
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.value_type().cmp(&other.value_type()),
        }
    }
}

fn ordered(op: CompareOp, ord: Ordering) -> Option<bool> {
    Some(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Neq => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
        CompareOp::Contains | CompareOp::NotContains => return None,
    })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_i64() {
        assert_eq!(Value::from(42_i64), Value::Int(42));
    }

    #[test]
    fn from_str() {
        assert_eq!(Value::from("hello"), Value::String("hello".to_owned()));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.14).to_string(), "3.14");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("hello".into()).to_string(), "\"hello\"");
    }

    #[test]
    fn value_type_tags() {
        assert_eq!(Value::Int(1).value_type(), ValueType::Int);
        assert_eq!(Value::Float(1.0).value_type(), ValueType::Float);
        assert_eq!(Value::Bool(true).value_type(), ValueType::Bool);
        assert_eq!(Value::String("s".into()).value_type(), ValueType::String);
    }

    #[test]
    fn parse_type_names() {
        assert_eq!(ValueType::parse("int"), Some(ValueType::Int));
        assert_eq!(ValueType::parse("float"), Some(ValueType::Float));
        assert_eq!(ValueType::parse("string"), Some(ValueType::String));
        assert_eq!(ValueType::parse("bool"), Some(ValueType::Bool));
        assert_eq!(ValueType::parse("decimal"), None);
    }

    #[test]
    fn compare_int() {
        let a = Value::Int(10);
        let b = Value::Int(20);
        assert_eq!(a.compare(CompareOp::Eq, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Neq, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Lt, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Lte, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Gt, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Gte, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Gte, &a), Some(true));
    }

    #[test]
    fn compare_float() {
        let a = Value::Float(1.5);
        let b = Value::Float(2.5);
        assert_eq!(a.compare(CompareOp::Lt, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Gt, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Eq, &a), Some(true));
    }

    #[test]
    fn compare_bool_only_equality() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(t.compare(CompareOp::Eq, &f), Some(false));
        assert_eq!(t.compare(CompareOp::Neq, &f), Some(true));
        assert_eq!(t.compare(CompareOp::Lt, &f), None);
    }

    #[test]
    fn compare_string_contains() {
        let hay = Value::String("us-east-1".into());
        let needle = Value::String("east".into());
        assert_eq!(hay.compare(CompareOp::Contains, &needle), Some(true));
        assert_eq!(hay.compare(CompareOp::NotContains, &needle), Some(false));
        assert_eq!(hay.compare(CompareOp::Lt, &needle), None);
    }

    #[test]
    fn compare_cross_type_returns_none() {
        let i = Value::Int(1);
        let s = Value::String("hello".into());
        assert_eq!(i.compare(CompareOp::Eq, &s), None);
        assert_eq!(i.compare(CompareOp::Eq, &Value::Float(1.0)), None);
    }

    #[test]
    fn total_order_by_type_then_value() {
        assert_eq!(Value::Int(5).total_cmp(&Value::Int(6)), Ordering::Less);
        assert_eq!(Value::Int(999).total_cmp(&Value::Float(0.0)), Ordering::Less);
        assert_eq!(
            Value::Bool(true).total_cmp(&Value::String(String::new())),
            Ordering::Less
        );
        assert_eq!(
            Value::Float(f64::NAN).total_cmp(&Value::Float(f64::NAN)),
            Ordering::Equal
        );
    }
}
