//! Schema-change operations.
//!
//! Every operation carries enough information to build its inverse, which
//! is how the Down list of a migration is produced.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_schema::FieldType;

use crate::snapshot::FieldSnapshot;

/// A resolved foreign-key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    /// Referenced entity.
    pub entity: String,
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

/// A column as it should exist in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Semantic type.
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Accepts NULL.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary: bool,
    /// Unique constraint.
    pub unique: bool,
    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Foreign-key reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyReference>,
}

impl ColumnDefinition {
    /// Build a column from a field snapshot.
    pub fn from_field(field: &FieldSnapshot, references: Option<ForeignKeyReference>) -> Self {
        Self {
            name: field.column_name.clone(),
            ty: field.ty.clone(),
            nullable: field.is_nullable,
            primary: field.is_primary,
            unique: field.is_unique,
            default: field.default_value.clone(),
            references,
        }
    }
}

/// An index created along with a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
}

/// Create a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableOperation {
    /// Table name.
    pub table_name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl CreateTableOperation {
    /// Primary-key column names.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Drop a table. Keeps the definition so the drop can be reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTableOperation {
    /// Table name.
    pub table_name: String,
    /// Definition of the table being dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<CreateTableOperation>,
}

/// Add a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColumnOperation {
    /// Table name.
    pub table_name: String,
    /// The new column.
    pub column: ColumnDefinition,
}

/// Drop a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColumnOperation {
    /// Table name.
    pub table_name: String,
    /// Column name.
    pub column_name: String,
    /// Definition of the column being dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnDefinition>,
}

/// Rename a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameColumnOperation {
    /// Table name.
    pub table_name: String,
    /// Current column name.
    pub old_name: String,
    /// New column name.
    pub new_name: String,
}

/// Change a column's type, nullability, uniqueness or default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterColumnOperation {
    /// Table name.
    pub table_name: String,
    /// Column as it is.
    pub from: ColumnDefinition,
    /// Column as it should be.
    pub to: ColumnDefinition,
}

/// Kind of a migration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// CREATE TABLE.
    CreateTable,
    /// DROP TABLE.
    DropTable,
    /// ADD COLUMN.
    AddColumn,
    /// DROP COLUMN.
    DropColumn,
    /// RENAME COLUMN.
    RenameColumn,
    /// ALTER COLUMN.
    AlterColumn,
}

/// One schema-change operation for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MigrationOperation {
    /// Create a table.
    CreateTable {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: CreateTableOperation,
    },
    /// Drop a table.
    DropTable {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: DropTableOperation,
    },
    /// Add a column.
    AddColumn {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: AddColumnOperation,
    },
    /// Drop a column.
    DropColumn {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: DropColumnOperation,
    },
    /// Rename a column.
    RenameColumn {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: RenameColumnOperation,
    },
    /// Alter a column.
    AlterColumn {
        /// Owning entity.
        entity_name: String,
        /// Operation details.
        details: AlterColumnOperation,
    },
}

impl MigrationOperation {
    /// Kind tag.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DropTable { .. } => OperationKind::DropTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::RenameColumn { .. } => OperationKind::RenameColumn,
            Self::AlterColumn { .. } => OperationKind::AlterColumn,
        }
    }

    /// Owning entity name.
    pub fn entity_name(&self) -> &str {
        match self {
            Self::CreateTable { entity_name, .. }
            | Self::DropTable { entity_name, .. }
            | Self::AddColumn { entity_name, .. }
            | Self::DropColumn { entity_name, .. }
            | Self::RenameColumn { entity_name, .. }
            | Self::AlterColumn { entity_name, .. } => entity_name,
        }
    }

    /// Table the operation touches.
    pub fn table_name(&self) -> &str {
        match self {
            Self::CreateTable { details, .. } => &details.table_name,
            Self::DropTable { details, .. } => &details.table_name,
            Self::AddColumn { details, .. } => &details.table_name,
            Self::DropColumn { details, .. } => &details.table_name,
            Self::RenameColumn { details, .. } => &details.table_name,
            Self::AlterColumn { details, .. } => &details.table_name,
        }
    }

    /// Whether applying the operation discards data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }

    /// The operation that undoes this one.
    ///
    /// `None` only for drops that were recorded without their definition.
    pub fn inverse(&self) -> Option<Self> {
        let entity_name = self.entity_name().to_string();
        let op = match self {
            Self::CreateTable { details, .. } => Self::DropTable {
                entity_name,
                details: DropTableOperation {
                    table_name: details.table_name.clone(),
                    definition: Some(details.clone()),
                },
            },
            Self::DropTable { details, .. } => Self::CreateTable {
                entity_name,
                details: details.definition.clone()?,
            },
            Self::AddColumn { details, .. } => Self::DropColumn {
                entity_name,
                details: DropColumnOperation {
                    table_name: details.table_name.clone(),
                    column_name: details.column.name.clone(),
                    column: Some(details.column.clone()),
                },
            },
            Self::DropColumn { details, .. } => Self::AddColumn {
                entity_name,
                details: AddColumnOperation {
                    table_name: details.table_name.clone(),
                    column: details.column.clone()?,
                },
            },
            Self::RenameColumn { details, .. } => Self::RenameColumn {
                entity_name,
                details: RenameColumnOperation {
                    table_name: details.table_name.clone(),
                    old_name: details.new_name.clone(),
                    new_name: details.old_name.clone(),
                },
            },
            Self::AlterColumn { details, .. } => Self::AlterColumn {
                entity_name,
                details: AlterColumnOperation {
                    table_name: details.table_name.clone(),
                    from: details.to.clone(),
                    to: details.from.clone(),
                },
            },
        };
        Some(op)
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { details, .. } => write!(f, "CreateTable {}", details.table_name),
            Self::DropTable { details, .. } => write!(f, "DropTable {}", details.table_name),
            Self::AddColumn { details, .. } => {
                write!(f, "AddColumn {}.{}", details.table_name, details.column.name)
            }
            Self::DropColumn { details, .. } => {
                write!(f, "DropColumn {}.{}", details.table_name, details.column_name)
            }
            Self::RenameColumn { details, .. } => write!(
                f,
                "RenameColumn {}.{} -> {}",
                details.table_name, details.old_name, details.new_name
            ),
            Self::AlterColumn { details, .. } => {
                write!(f, "AlterColumn {}.{}", details.table_name, details.to.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(name: &str, ty: FieldType) -> ColumnDefinition {
        ColumnDefinition {
            name: name.to_string(),
            ty,
            nullable: false,
            primary: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    fn create_users() -> MigrationOperation {
        let mut id = column("id", FieldType::Uuid);
        id.primary = true;
        MigrationOperation::CreateTable {
            entity_name: "User".into(),
            details: CreateTableOperation {
                table_name: "users".into(),
                columns: vec![id, column("email", FieldType::String)],
                indexes: Vec::new(),
            },
        }
    }

    #[test]
    fn test_create_table_inverse_roundtrip() {
        let create = create_users();
        let drop = create.inverse().unwrap();
        assert_eq!(drop.kind(), OperationKind::DropTable);
        assert!(drop.is_destructive());
        assert_eq!(drop.inverse().unwrap(), create);
    }

    #[test]
    fn test_add_column_inverse() {
        let add = MigrationOperation::AddColumn {
            entity_name: "User".into(),
            details: AddColumnOperation {
                table_name: "users".into(),
                column: column("age", FieldType::Int32),
            },
        };
        let drop = add.inverse().unwrap();
        match &drop {
            MigrationOperation::DropColumn { details, .. } => {
                assert_eq!(details.column_name, "age");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(drop.inverse().unwrap(), add);
    }

    #[test]
    fn test_rename_inverse_swaps() {
        let rename = MigrationOperation::RenameColumn {
            entity_name: "User".into(),
            details: RenameColumnOperation {
                table_name: "users".into(),
                old_name: "OldName".into(),
                new_name: "NewName".into(),
            },
        };
        assert_eq!(
            rename.inverse().unwrap().to_string(),
            "RenameColumn users.NewName -> OldName"
        );
    }

    #[test]
    fn test_alter_inverse_swaps() {
        let alter = MigrationOperation::AlterColumn {
            entity_name: "User".into(),
            details: AlterColumnOperation {
                table_name: "users".into(),
                from: column("age", FieldType::Int32),
                to: column("age", FieldType::Int64),
            },
        };
        match alter.inverse().unwrap() {
            MigrationOperation::AlterColumn { details, .. } => {
                assert_eq!(details.to.ty, FieldType::Int32);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_drop_without_definition_has_no_inverse() {
        let drop = MigrationOperation::DropColumn {
            entity_name: "User".into(),
            details: DropColumnOperation {
                table_name: "users".into(),
                column_name: "age".into(),
                column: None,
            },
        };
        assert!(drop.inverse().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(create_users()).unwrap();
        assert_eq!(json["type"], "CreateTable");
        assert_eq!(json["entity_name"], "User");
        assert_eq!(json["details"]["table_name"], "users");
        assert_eq!(json["details"]["columns"][0]["type"], "uuid");
    }
}
