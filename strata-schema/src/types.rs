//! Semantic field types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The semantic type of a field, independent of any SQL dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 128-bit unique identifier.
    Uuid,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Arbitrary precision decimal.
    Decimal,
    /// Boolean.
    Bool,
    /// UTF-8 text.
    String,
    /// Point in time with time zone.
    Timestamp,
    /// Calendar date.
    Date,
    /// Raw bytes.
    Bytes,
    /// JSON document.
    Json,
    /// Any other type, kept verbatim.
    Custom(String),
}

impl FieldType {
    /// Get the canonical name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uuid => "uuid",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Decimal => "decimal",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Bytes => "bytes",
            Self::Json => "json",
            Self::Custom(name) => name,
        }
    }

    /// Whether values of this type behave like references (nullable unless told otherwise).
    pub fn is_reference_like(&self) -> bool {
        matches!(self, Self::Bytes | Self::Json)
    }

    /// Whether this is the unique-identifier type.
    pub fn is_uuid(&self) -> bool {
        matches!(self, Self::Uuid)
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "uuid" => Self::Uuid,
            "int" | "int32" | "i32" => Self::Int32,
            "int64" | "bigint" | "i64" => Self::Int64,
            "float" | "float64" | "f64" | "double" => Self::Float64,
            "decimal" => Self::Decimal,
            "bool" | "boolean" => Self::Bool,
            "string" | "text" => Self::String,
            "timestamp" | "datetime" => Self::Timestamp,
            "date" => Self::Date,
            "bytes" => Self::Bytes,
            "json" => Self::Json,
            _ => Self::Custom(s.to_string()),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        // FromStr is infallible
        Ok(s.parse().unwrap_or(Self::Custom(s)))
    }
}

/// A declared field type: the semantic type plus whether the source wraps it
/// in an optional/reference container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    /// Semantic type.
    pub ty: FieldType,
    /// Declared as optional (e.g. `Option<T>`).
    pub optional: bool,
}

impl DeclaredType {
    /// A plain value type.
    pub fn value(ty: FieldType) -> Self {
        Self {
            ty,
            optional: false,
        }
    }

    /// An optional type.
    pub fn optional(ty: FieldType) -> Self {
        Self { ty, optional: true }
    }

    /// Default nullability before annotations are applied.
    pub fn default_nullable(&self) -> bool {
        self.optional || self.ty.is_reference_like()
    }
}

impl From<FieldType> for DeclaredType {
    fn from(ty: FieldType) -> Self {
        Self::value(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("bigint".parse::<FieldType>().unwrap(), FieldType::Int64);
        assert_eq!("UUID".parse::<FieldType>().unwrap(), FieldType::Uuid);
        assert_eq!(
            "geometry".parse::<FieldType>().unwrap(),
            FieldType::Custom("geometry".to_string())
        );
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&FieldType::Timestamp).unwrap();
        assert_eq!(json, "\"timestamp\"");
        let back: FieldType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldType::Timestamp);
    }

    #[test]
    fn test_default_nullable() {
        assert!(!DeclaredType::value(FieldType::Int64).default_nullable());
        assert!(DeclaredType::optional(FieldType::Int64).default_nullable());
        assert!(DeclaredType::value(FieldType::Json).default_nullable());
    }
}
