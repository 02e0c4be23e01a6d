//! Language-neutral type descriptors.
//!
//! A [`TypeDescriptor`] is the structural description of an entity type that
//! the rest of the engine consumes: an ordered list of fields, each with a
//! name, a declared type and an annotation string. Descriptors are built once
//! when an entity is registered.

use crate::types::{DeclaredType, FieldType};

/// Structural description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Entity name.
    pub name: String,
    /// Explicit table name, if any.
    pub table_name: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Create a descriptor with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Set an explicit table name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Append a value-typed field.
    pub fn field(self, name: impl Into<String>, ty: FieldType, tags: impl Into<String>) -> Self {
        self.with_field(FieldDescriptor::new(name, DeclaredType::value(ty), tags))
    }

    /// Append an optional field.
    pub fn optional_field(
        self,
        name: impl Into<String>,
        ty: FieldType,
        tags: impl Into<String>,
    ) -> Self {
        self.with_field(FieldDescriptor::new(name, DeclaredType::optional(ty), tags))
    }

    /// Append a prepared field descriptor.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Structural description of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub declared: DeclaredType,
    /// Raw annotation string.
    pub tags: String,
}

impl FieldDescriptor {
    /// Create a field descriptor.
    pub fn new(name: impl Into<String>, declared: DeclaredType, tags: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared,
            tags: tags.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let desc = TypeDescriptor::new("User")
            .table("app_users")
            .field("id", FieldType::Uuid, "primary_key")
            .optional_field("nickname", FieldType::String, "")
            .field("age", FieldType::Int32, "");

        let names: Vec<_> = desc.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "nickname", "age"]);
        assert_eq!(desc.table_name.as_deref(), Some("app_users"));
        assert!(desc.fields[1].declared.optional);
    }
}
