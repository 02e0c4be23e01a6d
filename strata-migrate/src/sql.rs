//! SQL generation for migration operations.

use strata_query::{Statement, quote_ident};
use strata_schema::FieldType;

use crate::operation::{
    AlterColumnOperation, ColumnDefinition, CreateTableOperation, MigrationOperation,
};

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSqlGenerator;

impl PostgresSqlGenerator {
    /// Generate statements for a list of operations, in order.
    pub fn generate(&self, operations: &[MigrationOperation]) -> Vec<Statement> {
        operations
            .iter()
            .flat_map(|op| self.operation(op))
            .collect()
    }

    /// Generate statements for a single operation.
    pub fn operation(&self, op: &MigrationOperation) -> Vec<Statement> {
        let sql = match op {
            MigrationOperation::CreateTable { details, .. } => self.create_table(details),
            MigrationOperation::DropTable { details, .. } => vec![format!(
                "DROP TABLE IF EXISTS {} CASCADE;",
                quote_ident(&details.table_name)
            )],
            MigrationOperation::AddColumn { details, .. } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                quote_ident(&details.table_name),
                self.column_definition(&details.column)
            )],
            MigrationOperation::DropColumn { details, .. } => vec![format!(
                "ALTER TABLE {} DROP COLUMN IF EXISTS {};",
                quote_ident(&details.table_name),
                quote_ident(&details.column_name)
            )],
            MigrationOperation::RenameColumn { details, .. } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                quote_ident(&details.table_name),
                quote_ident(&details.old_name),
                quote_ident(&details.new_name)
            )],
            MigrationOperation::AlterColumn { details, .. } => self.alter_column(details),
        };
        sql.into_iter().map(Statement::new).collect()
    }

    /// Map a semantic type to its PostgreSQL spelling.
    pub fn sql_type(&self, ty: &FieldType) -> String {
        match ty {
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Int32 => "INTEGER".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float64 => "DOUBLE PRECISION".to_string(),
            FieldType::Decimal => "NUMERIC".to_string(),
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::String => "TEXT".to_string(),
            FieldType::Timestamp => "TIMESTAMPTZ".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Bytes => "BYTEA".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Custom(name) => name.clone(),
        }
    }

    fn create_table(&self, table: &CreateTableOperation) -> Vec<String> {
        let mut columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let pk: Vec<String> = table.primary_key().into_iter().map(quote_ident).collect();
        if !pk.is_empty() {
            columns.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }

        let mut stmts = vec![format!(
            "CREATE TABLE {} (\n    {}\n);",
            quote_ident(&table.table_name),
            columns.join(",\n    ")
        )];

        // Unique columns already carry an inline constraint.
        for index in table.indexes.iter().filter(|i| !i.unique) {
            let cols: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
            stmts.push(format!(
                "CREATE INDEX {} ON {} ({});",
                quote_ident(&index.name),
                quote_ident(&table.table_name),
                cols.join(", ")
            ));
        }
        stmts
    }

    /// Generate a column definition.
    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![quote_ident(&column.name), self.sql_type(&column.ty)];

        if !column.nullable && !column.primary {
            parts.push("NOT NULL".to_string());
        }

        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }

        if let Some(reference) = &column.references {
            parts.push(format!(
                "REFERENCES {} ({})",
                quote_ident(&reference.table),
                quote_ident(&reference.column)
            ));
        }

        parts.join(" ")
    }

    fn alter_column(&self, alter: &AlterColumnOperation) -> Vec<String> {
        let table = quote_ident(&alter.table_name);
        let column = quote_ident(&alter.to.name);
        let (from, to) = (&alter.from, &alter.to);
        let mut stmts = Vec::new();

        if from.ty != to.ty {
            let new_type = self.sql_type(&to.ty);
            stmts.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                table, column, new_type, column, new_type
            ));
        }

        if from.nullable != to.nullable {
            let action = if to.nullable { "DROP" } else { "SET" };
            stmts.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                table, column, action
            ));
        }

        if from.default != to.default {
            match &to.default {
                Some(default) => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    table, column, default
                )),
                None => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table, column
                )),
            }
        }

        if from.unique != to.unique {
            let constraint = quote_ident(&format!("{}_{}_key", alter.table_name, to.name));
            if to.unique {
                stmts.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                    table, constraint, column
                ));
            } else {
                stmts.push(format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                    table, constraint
                ));
            }
        }

        stmts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{
        AddColumnOperation, DropTableOperation, ForeignKeyReference, IndexDefinition,
        RenameColumnOperation,
    };
    use pretty_assertions::assert_eq;

    fn col(name: &str, ty: FieldType) -> ColumnDefinition {
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

    fn sql(stmts: Vec<Statement>) -> Vec<String> {
        stmts.into_iter().map(|s| s.sql).collect()
    }

    #[test]
    fn test_create_table() {
        let op = MigrationOperation::CreateTable {
            entity_name: "Order".into(),
            details: CreateTableOperation {
                table_name: "orders".into(),
                columns: vec![
                    ColumnDefinition {
                        primary: true,
                        ..col("Id", FieldType::Uuid)
                    },
                    ColumnDefinition {
                        references: Some(ForeignKeyReference {
                            entity: "User".into(),
                            table: "users".into(),
                            column: "Id".into(),
                        }),
                        ..col("UserId", FieldType::Uuid)
                    },
                    ColumnDefinition {
                        nullable: true,
                        ..col("Note", FieldType::String)
                    },
                ],
                indexes: vec![IndexDefinition {
                    name: "orders_UserId_idx".into(),
                    columns: vec!["UserId".into()],
                    unique: false,
                }],
            },
        };

        let stmts = sql(PostgresSqlGenerator.operation(&op));
        assert_eq!(
            stmts,
            vec![
                "CREATE TABLE \"orders\" (\n    \"Id\" UUID,\n    \"UserId\" UUID NOT NULL REFERENCES \"users\" (\"Id\"),\n    \"Note\" TEXT,\n    PRIMARY KEY (\"Id\")\n);".to_string(),
                "CREATE INDEX \"orders_UserId_idx\" ON \"orders\" (\"UserId\");".to_string(),
            ]
        );
    }

    #[test]
    fn test_column_operations() {
        let ops = vec![
            MigrationOperation::AddColumn {
                entity_name: "User".into(),
                details: AddColumnOperation {
                    table_name: "users".into(),
                    column: ColumnDefinition {
                        default: Some("0".into()),
                        ..col("Age", FieldType::Int32)
                    },
                },
            },
            MigrationOperation::RenameColumn {
                entity_name: "User".into(),
                details: RenameColumnOperation {
                    table_name: "users".into(),
                    old_name: "Mail".into(),
                    new_name: "Email".into(),
                },
            },
            MigrationOperation::DropTable {
                entity_name: "Audit".into(),
                details: DropTableOperation {
                    table_name: "audits".into(),
                    definition: None,
                },
            },
        ];

        assert_eq!(
            sql(PostgresSqlGenerator.generate(&ops)),
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"Age\" INTEGER NOT NULL DEFAULT 0;",
                "ALTER TABLE \"users\" RENAME COLUMN \"Mail\" TO \"Email\";",
                "DROP TABLE IF EXISTS \"audits\" CASCADE;",
            ]
        );
    }

    #[test]
    fn test_alter_column() {
        let op = MigrationOperation::AlterColumn {
            entity_name: "User".into(),
            details: AlterColumnOperation {
                table_name: "users".into(),
                from: col("Age", FieldType::Int32),
                to: ColumnDefinition {
                    nullable: true,
                    unique: true,
                    ..col("Age", FieldType::Int64)
                },
            },
        };

        assert_eq!(
            sql(PostgresSqlGenerator.operation(&op)),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"Age\" TYPE BIGINT USING \"Age\"::BIGINT;",
                "ALTER TABLE \"users\" ALTER COLUMN \"Age\" DROP NOT NULL;",
                "ALTER TABLE \"users\" ADD CONSTRAINT \"users_Age_key\" UNIQUE (\"Age\");",
            ]
        );
    }

    #[test]
    fn test_custom_type_verbatim() {
        assert_eq!(
            PostgresSqlGenerator.sql_type(&FieldType::Custom("CITEXT".into())),
            "CITEXT"
        );
        assert_eq!(PostgresSqlGenerator.sql_type(&FieldType::Json), "JSONB");
    }
}
