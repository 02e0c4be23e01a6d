//! Drift detection between the model snapshot and the live database.
//!
//! The snapshot says what the migrations should have produced; the
//! execution layer's column introspection says what is actually there.

use std::collections::HashMap;

use strata_query::ColumnInfo;

use crate::snapshot::ModelSnapshot;
use crate::sql::PostgresSqlGenerator;

/// Detected drift between the snapshot and the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDrift {
    /// Tables in the snapshot that the database does not have.
    pub missing_tables: Vec<String>,
    /// Columns that differ.
    pub field_differences: Vec<FieldDrift>,
}

impl SchemaDrift {
    /// Check if there's any drift.
    pub fn has_drift(&self) -> bool {
        !self.missing_tables.is_empty() || !self.field_differences.is_empty()
    }

    /// Get a summary of the drift.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.missing_tables.is_empty() {
            parts.push(format!("{} missing tables", self.missing_tables.len()));
        }
        if !self.field_differences.is_empty() {
            parts.push(format!(
                "{} field differences",
                self.field_differences.len()
            ));
        }

        if parts.is_empty() {
            "No drift detected".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A detected difference in a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDrift {
    /// Entity name.
    pub entity: String,
    /// Column name.
    pub column: String,
    /// Description of the difference.
    pub description: String,
}

/// Compare a snapshot with introspected columns, keyed by table name.
///
/// A table with no introspected columns counts as missing.
pub fn detect_drift(
    snapshot: &ModelSnapshot,
    actual: &HashMap<String, Vec<ColumnInfo>>,
) -> SchemaDrift {
    let mut drift = SchemaDrift::default();
    let generator = PostgresSqlGenerator;

    for entity in snapshot.entities.values() {
        let columns = match actual.get(&entity.table_name) {
            Some(columns) if !columns.is_empty() => columns,
            _ => {
                drift.missing_tables.push(entity.table_name.clone());
                continue;
            }
        };
        let mut push = |column: &str, description: String| {
            drift.field_differences.push(FieldDrift {
                entity: entity.name.clone(),
                column: column.to_string(),
                description,
            });
        };

        for field in entity.fields.values() {
            let Some(info) = columns.iter().find(|c| c.name == field.column_name) else {
                push(&field.column_name, "Column missing in database".to_string());
                continue;
            };

            let expected = generator.sql_type(&field.ty);
            if normalize_type(&expected) != normalize_type(&info.data_type) {
                push(
                    &field.column_name,
                    format!("Type mismatch: expected {}, got {}", expected, info.data_type),
                );
            }
            // Primary-key columns are implicitly NOT NULL.
            if !field.is_primary && field.is_nullable != info.nullable {
                push(
                    &field.column_name,
                    format!(
                        "Nullability mismatch: expected {}, got {}",
                        nullability(field.is_nullable),
                        nullability(info.nullable)
                    ),
                );
            }
            if field.is_primary != info.is_primary {
                push(
                    &field.column_name,
                    format!(
                        "Primary key mismatch: expected {}, got {}",
                        field.is_primary, info.is_primary
                    ),
                );
            }
        }

        for info in columns {
            if !entity.fields.values().any(|f| f.column_name == info.name) {
                push(&info.name, "Extra column in database".to_string());
            }
        }
    }

    drift
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

/// Collapse PostgreSQL type aliases to one spelling.
fn normalize_type(data_type: &str) -> String {
    let lower = data_type.trim().to_ascii_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();
    match base {
        "int" | "int4" | "integer" | "serial" => "integer",
        "int8" | "bigint" | "bigserial" => "bigint",
        "float8" | "double precision" => "double precision",
        "numeric" | "decimal" => "numeric",
        "bool" | "boolean" => "boolean",
        "text" | "varchar" | "character varying" => "text",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "json" | "jsonb" => "jsonb",
        other => other,
    }
    .to_string()
}
