//! Entity metadata extraction.
//!
//! Turns a [`TypeDescriptor`] into an immutable [`EntityModel`]: the table
//! name, ordered fields, primary-key fields and the per-field flags derived
//! from annotation tags.

use std::collections::HashSet;

use convert_case::{Case, Casing};
use tracing::trace;

use crate::annotation::Tags;
use crate::descriptor::{FieldDescriptor, TypeDescriptor};
use crate::error::{SchemaError, SchemaResult};
use crate::types::FieldType;

/// Metadata for one field of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    /// Field name.
    pub name: String,
    /// Column name.
    pub column_name: String,
    /// Semantic type.
    pub ty: FieldType,
    /// Part of the primary key.
    pub is_primary: bool,
    /// Accepts NULL.
    pub is_nullable: bool,
    /// Carries a unique constraint.
    pub is_unique: bool,
    /// Carries a plain index.
    pub is_indexed: bool,
    /// Default value expression.
    pub default_value: Option<String>,
    /// Explicit rename hint: the name this field had previously.
    pub old_name: Option<String>,
    /// Explicitly referenced entity (`fk:<Entity>`).
    pub references: Option<String>,
    /// All parsed tags.
    pub tags: Tags,
}

impl FieldModel {
    fn from_descriptor(entity: &str, desc: &FieldDescriptor) -> SchemaResult<Self> {
        let tags = Tags::parse(entity, &desc.name, &desc.tags)?;

        let ty = match tags.value("type") {
            Some(t) => t.parse().unwrap_or(FieldType::Custom(t.to_string())),
            None => desc.declared.ty.clone(),
        };

        let mut is_nullable = desc.declared.default_nullable();
        if tags.has("null") {
            is_nullable = true;
        }
        if tags.has("not_null") {
            is_nullable = false;
        }

        let is_primary = tags.has("primary_key");
        if is_primary {
            is_nullable = false;
        }

        Ok(Self {
            name: desc.name.clone(),
            column_name: tags.value("column").unwrap_or(&desc.name).to_string(),
            ty,
            is_primary,
            is_nullable,
            is_unique: tags.has("unique"),
            is_indexed: tags.has("index"),
            default_value: tags.value("default").map(str::to_string),
            old_name: tags.value("old_name").map(str::to_string),
            references: tags
                .value("fk")
                .or_else(|| tags.value("references"))
                .map(str::to_string),
            tags,
        })
    }

    /// Entity name implied by the `<Entity>Id` naming convention, if this
    /// field is a unique identifier following it.
    pub fn conventional_reference(&self) -> Option<&str> {
        conventional_reference(&self.name, &self.ty, self.is_primary)
    }
}

/// Entity name implied by a field called `<Entity>Id` or `<entity>_id`.
///
/// Only non-primary uuid fields follow the convention. The returned stem is
/// a candidate; it still has to match a known entity.
pub fn conventional_reference<'a>(
    name: &'a str,
    ty: &FieldType,
    is_primary: bool,
) -> Option<&'a str> {
    if !ty.is_uuid() || is_primary {
        return None;
    }
    if name.len() <= 2 || !name.is_char_boundary(name.len() - 2) {
        return None;
    }
    let (stem, suffix) = name.split_at(name.len() - 2);
    if !suffix.eq_ignore_ascii_case("id") {
        return None;
    }
    let stem = stem.trim_end_matches('_');
    (!stem.is_empty()).then_some(stem)
}

/// Where a foreign-key hint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintSource {
    /// An explicit `fk:` annotation.
    Annotation,
    /// The `<Entity>Id` naming convention.
    NamingConvention,
}

/// A field that may reference another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyHint {
    /// Referencing field name.
    pub field: String,
    /// Candidate referenced entity name.
    pub target: String,
    /// How the hint was found.
    pub source: HintSource,
}

/// An index declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Unique index.
    pub unique: bool,
}

/// In-memory description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    /// Entity name.
    pub name: String,
    /// Table name.
    pub table_name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldModel>,
    /// Names of the primary-key fields.
    pub primary_key: Vec<String>,
}

impl EntityModel {
    /// Extract an entity model from a type descriptor.
    pub fn from_descriptor(desc: &TypeDescriptor) -> SchemaResult<Self> {
        let name = desc.name.trim();
        if name.is_empty() {
            return Err(SchemaError::invalid_entity(&desc.name, "entity name is empty"));
        }

        let mut fields = Vec::with_capacity(desc.fields.len());
        let mut seen_names = HashSet::new();
        let mut seen_columns = HashSet::new();

        for field_desc in &desc.fields {
            if field_desc.name.trim().is_empty() {
                return Err(SchemaError::invalid_field(name, "", "field name is empty"));
            }
            let field = FieldModel::from_descriptor(name, field_desc)?;
            if !seen_names.insert(field.name.clone()) {
                return Err(SchemaError::duplicate(
                    "field",
                    format!("{}.{}", name, field.name),
                ));
            }
            if !seen_columns.insert(field.column_name.clone()) {
                return Err(SchemaError::duplicate(
                    "column",
                    format!("{}.{}", name, field.column_name),
                ));
            }
            fields.push(field);
        }

        // Fall back to a field called `id` when nothing is tagged primary_key
        if !fields.iter().any(|f| f.is_primary) {
            if let Some(id) = fields.iter_mut().find(|f| f.name.eq_ignore_ascii_case("id")) {
                trace!(entity = name, field = %id.name, "using conventional primary key");
                id.is_primary = true;
                id.is_nullable = false;
            }
        }

        let primary_key = fields
            .iter()
            .filter(|f| f.is_primary)
            .map(|f| f.name.clone())
            .collect();

        let table_name = desc
            .table_name
            .clone()
            .unwrap_or_else(|| default_table_name(name));

        Ok(Self {
            name: name.to_string(),
            table_name,
            fields,
            primary_key,
        })
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the primary-key fields.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|f| f.is_primary)
    }

    /// Column name of the first primary-key field.
    pub fn primary_key_column(&self) -> Option<&str> {
        self.primary_key_fields()
            .next()
            .map(|f| f.column_name.as_str())
    }

    /// Candidate foreign-key references declared by this entity.
    ///
    /// Naming-convention candidates are unverified; the caller decides
    /// whether the target actually names a known entity.
    pub fn foreign_keys(&self) -> Vec<ForeignKeyHint> {
        let mut hints = Vec::new();
        for field in &self.fields {
            if let Some(target) = &field.references {
                hints.push(ForeignKeyHint {
                    field: field.name.clone(),
                    target: target.clone(),
                    source: HintSource::Annotation,
                });
            } else if let Some(target) = field.conventional_reference() {
                hints.push(ForeignKeyHint {
                    field: field.name.clone(),
                    target: target.to_string(),
                    source: HintSource::NamingConvention,
                });
            }
        }
        hints
    }

    /// Indexes implied by `unique` and `index` tags.
    pub fn indexes(&self) -> Vec<IndexModel> {
        self.fields
            .iter()
            .filter(|f| !f.is_primary && (f.is_unique || f.is_indexed))
            .map(|f| IndexModel {
                name: if f.is_unique {
                    format!("{}_{}_key", self.table_name, f.column_name)
                } else {
                    format!("{}_{}_idx", self.table_name, f.column_name)
                },
                columns: vec![f.column_name.clone()],
                unique: f.is_unique,
            })
            .collect()
    }
}

/// Default table name: pluralised snake_case of the entity name.
pub fn default_table_name(entity: &str) -> String {
    let snake = entity.to_case(Case::Snake);
    if snake.ends_with('s') || snake.ends_with('x') || snake.ends_with("ch") || snake.ends_with("sh")
    {
        format!("{}es", snake)
    } else if let Some(stem) = snake.strip_suffix('y')
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        format!("{}ies", stem)
    } else {
        format!("{}s", snake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeclaredType;

    fn user() -> TypeDescriptor {
        TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Email", FieldType::String, "unique;not_null")
            .optional_field("Nickname", FieldType::String, "")
            .field("Age", FieldType::Int32, "default:0")
            .field("Profile", FieldType::Json, "")
    }

    #[test]
    fn test_extract_basic() {
        let model = EntityModel::from_descriptor(&user()).unwrap();
        assert_eq!(model.name, "User");
        assert_eq!(model.table_name, "users");
        assert_eq!(model.primary_key, vec!["Id".to_string()]);

        let id = model.field("Id").unwrap();
        assert!(id.is_primary);
        assert!(!id.is_nullable);

        let email = model.field("Email").unwrap();
        assert!(email.is_unique);
        assert!(!email.is_nullable);

        assert!(model.field("Nickname").unwrap().is_nullable);
        assert!(!model.field("Age").unwrap().is_nullable);
        assert_eq!(model.field("Age").unwrap().default_value.as_deref(), Some("0"));
        assert!(model.field("Profile").unwrap().is_nullable);
    }

    #[test]
    fn test_primary_key_overrides_optional() {
        let desc = TypeDescriptor::new("Token").optional_field("Key", FieldType::String, "primary_key");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        assert!(!model.field("Key").unwrap().is_nullable);
    }

    #[test]
    fn test_conventional_primary_key() {
        let desc = TypeDescriptor::new("Tag")
            .field("id", FieldType::Int64, "")
            .field("label", FieldType::String, "");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        assert_eq!(model.primary_key, vec!["id".to_string()]);
    }

    #[test]
    fn test_column_and_type_overrides() {
        let desc = TypeDescriptor::new("User")
            .field("Name", FieldType::String, "column:full_name")
            .field("Score", FieldType::Int32, "type:int64");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        assert_eq!(model.field("Name").unwrap().column_name, "full_name");
        assert_eq!(model.field("Score").unwrap().ty, FieldType::Int64);
    }

    #[test]
    fn test_old_name_hint() {
        let desc = TypeDescriptor::new("User").field("NewName", FieldType::String, "old_name:OldName");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        assert_eq!(model.field("NewName").unwrap().old_name.as_deref(), Some("OldName"));
    }

    #[test]
    fn test_malformed_annotation_is_error() {
        let desc = TypeDescriptor::new("User").field("Age", FieldType::Int32, "default=1");
        let err = EntityModel::from_descriptor(&desc).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedAnnotation { .. }));
    }

    #[test]
    fn test_duplicate_field_is_error() {
        let desc = TypeDescriptor::new("User")
            .field("Name", FieldType::String, "")
            .with_field(FieldDescriptor::new(
                "Name",
                DeclaredType::value(FieldType::String),
                "",
            ));
        assert!(matches!(
            EntityModel::from_descriptor(&desc),
            Err(SchemaError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_foreign_key_hints() {
        let desc = TypeDescriptor::new("Order")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("UserId", FieldType::Uuid, "")
            .field("shop_id", FieldType::Uuid, "")
            .field("ProductId", FieldType::Int64, "")
            .field("Owner", FieldType::Uuid, "fk:Account");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        let hints = model.foreign_keys();

        let targets: Vec<_> = hints.iter().map(|h| (h.target.as_str(), h.source)).collect();
        assert_eq!(
            targets,
            vec![
                ("User", HintSource::NamingConvention),
                ("shop", HintSource::NamingConvention),
                ("Account", HintSource::Annotation),
            ]
        );
    }

    #[test]
    fn test_indexes() {
        let desc = TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key;unique")
            .field("Email", FieldType::String, "unique")
            .field("City", FieldType::String, "index");
        let model = EntityModel::from_descriptor(&desc).unwrap();
        let indexes = model.indexes();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name, "users_Email_key");
        assert!(indexes[0].unique);
        assert_eq!(indexes[1].name, "users_City_idx");
        assert!(!indexes[1].unique);
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("User"), "users");
        assert_eq!(default_table_name("OrderItem"), "order_items");
        assert_eq!(default_table_name("Category"), "categories");
        assert_eq!(default_table_name("Address"), "addresses");
        assert_eq!(default_table_name("Day"), "days");
    }
}
