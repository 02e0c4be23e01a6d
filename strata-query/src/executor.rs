//! Contracts for the external execution layer.
//!
//! The migration engine and the change tracker never talk to a driver
//! directly. They go through [`Executor`], which can run a statement, open a
//! [`Transaction`] and describe the columns of an existing table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::statement::Statement;

/// Column information returned by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Database data type.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub is_primary: bool,
    /// Default value expression.
    pub default_value: Option<String>,
    /// Maximum character length.
    pub max_length: Option<i32>,
}

impl ColumnInfo {
    /// Create column information for a non-null, non-key column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: false,
            is_primary: false,
            default_value: None,
            max_length: None,
        }
    }

    /// Mark the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as primary key.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// An open database transaction.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a statement inside the transaction, returning affected rows.
    async fn execute(&mut self, statement: &Statement) -> QueryResult<u64>;

    /// Commit the transaction.
    async fn commit(&mut self) -> QueryResult<()>;

    /// Roll the transaction back.
    async fn rollback(&mut self) -> QueryResult<()>;
}

/// The execution layer.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Transaction handle type.
    type Tx: Transaction;

    /// Execute a statement outside any explicit transaction.
    async fn execute(&self, statement: &Statement) -> QueryResult<u64>;

    /// Begin a transaction.
    async fn begin_transaction(&self) -> QueryResult<Self::Tx>;

    /// Describe the columns of an existing table; empty when it does not exist.
    async fn introspect_columns(&self, table: &str) -> QueryResult<Vec<ColumnInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_info_builder() {
        let col = ColumnInfo::new("id", "uuid").primary();
        assert!(col.is_primary);
        assert!(!col.nullable);

        let col = ColumnInfo::new("age", "integer").nullable().default_value("0");
        assert!(col.nullable);
        assert_eq!(col.default_value.as_deref(), Some("0"));
    }
}
