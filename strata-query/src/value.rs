//! Runtime column values.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A column value read from an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    Text(String),
    /// UUID value.
    Uuid(Uuid),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
    /// Decimal value in its textual form.
    Decimal(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// JSON document.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<Value>),
    /// Key/value map.
    Map(Vec<(String, Value)>),
    /// Nested struct, members in declaration order.
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is the zero value of its type: a key that has not been
    /// assigned yet.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Text(s) | Self::Decimal(s) => s.is_empty(),
            Self::Uuid(u) => u.is_nil(),
            Self::Timestamp(_) => false,
            Self::Bytes(b) => b.is_empty(),
            Self::Json(j) => j.is_null(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) | Self::Struct(m) => m.is_empty(),
        }
    }

    /// Whether the value can take part in a structural identity hash.
    ///
    /// Scalars are hashable. Lists, maps, byte buffers and JSON documents are
    /// not. A struct is hashable only if all of its members are.
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::Json(_) | Self::List(_) | Self::Map(_) => false,
            Self::Struct(members) => members.iter().all(|(_, v)| v.is_hashable()),
            _ => true,
        }
    }

    /// Feed a canonical encoding of this value into `sink`.
    ///
    /// Only meaningful for hashable values; non-hashable values write nothing.
    pub(crate) fn write_canonical(&self, sink: &mut impl FnMut(&[u8])) {
        match self {
            Self::Null => sink(&[0]),
            Self::Bool(b) => sink(&[1, *b as u8]),
            Self::Int(i) => {
                sink(&[2]);
                sink(&i.to_be_bytes());
            }
            Self::Float(f) => {
                sink(&[3]);
                sink(&f.to_bits().to_be_bytes());
            }
            Self::Text(s) => {
                sink(&[4]);
                sink(&(s.len() as u64).to_be_bytes());
                sink(s.as_bytes());
            }
            Self::Uuid(u) => {
                sink(&[5]);
                sink(u.as_bytes());
            }
            Self::Timestamp(t) => {
                sink(&[6]);
                sink(&t.timestamp_micros().to_be_bytes());
            }
            Self::Decimal(d) => {
                sink(&[7]);
                sink(&(d.len() as u64).to_be_bytes());
                sink(d.as_bytes());
            }
            Self::Struct(members) => {
                sink(&[8]);
                sink(&(members.len() as u64).to_be_bytes());
                for (name, value) in members {
                    sink(&(name.len() as u64).to_be_bytes());
                    sink(name.as_bytes());
                    value.write_canonical(sink);
                }
            }
            Self::Bytes(_) | Self::Json(_) | Self::List(_) | Self::Map(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) | Self::Decimal(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Json(j) => write!(f, "{}", j),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(members) | Self::Struct(members) => {
                f.write_str("{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(Value::Null.is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Uuid(Uuid::nil()).is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(!Value::Int(7).is_zero());
        assert!(!Value::Uuid(Uuid::new_v4()).is_zero());
    }

    #[test]
    fn test_is_hashable() {
        assert!(Value::Int(1).is_hashable());
        assert!(!Value::List(vec![Value::Int(1)]).is_hashable());
        assert!(!Value::Bytes(vec![1, 2]).is_hashable());
        assert!(Value::Struct(vec![("a".into(), Value::Int(1))]).is_hashable());
        assert!(
            !Value::Struct(vec![("tags".into(), Value::List(Vec::new()))]).is_hashable()
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }

    #[test]
    fn test_display() {
        let v = Value::Struct(vec![
            ("city".into(), Value::from("Oslo")),
            ("zip".into(), Value::Int(150)),
        ]);
        assert_eq!(v.to_string(), "{city: Oslo, zip: 150}");
    }
}
