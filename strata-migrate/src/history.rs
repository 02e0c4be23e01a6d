//! Migration history tracking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strata_query::{Statement, Value, quote_ident};

use crate::error::{MigrateResult, MigrationError};

/// Default name of the applied-migrations table.
pub const DEFAULT_HISTORY_TABLE: &str = "_strata_migrations";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Migration id (`<timestamp>_<slug>`).
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
    /// Snapshot version the migration produced.
    pub version: u32,
    /// Checksum of the migration content.
    pub checksum: String,
    /// The migration applied immediately before this one.
    pub depends_on: Option<String>,
}

/// Migration history repository.
#[async_trait]
pub trait MigrationHistoryRepository: Send + Sync {
    /// Initialize the migrations table.
    async fn initialize(&self) -> MigrateResult<()>;

    /// All applied migrations, in the order they were applied.
    async fn get_applied(&self) -> MigrateResult<Vec<Migration>>;

    /// Check if a migration has been applied.
    async fn is_applied(&self, id: &str) -> MigrateResult<bool> {
        Ok(self.get_applied().await?.iter().any(|m| m.id == id))
    }

    /// Get the last applied migration.
    async fn get_last_applied(&self) -> MigrateResult<Option<Migration>> {
        Ok(self.get_applied().await?.pop())
    }

    /// Record a migration as applied.
    async fn record_applied(&self, migration: &Migration) -> MigrateResult<()>;

    /// Delete the record of a migration.
    async fn remove(&self, id: &str) -> MigrateResult<()>;

    /// Delete every record.
    async fn clear(&self) -> MigrateResult<()>;
}

/// In-memory history, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    rows: RwLock<Vec<Migration>>,
}

impl MemoryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationHistoryRepository for MemoryHistory {
    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn get_applied(&self) -> MigrateResult<Vec<Migration>> {
        Ok(self.rows.read().clone())
    }

    async fn record_applied(&self, migration: &Migration) -> MigrateResult<()> {
        let mut rows = self.rows.write();
        if rows.iter().any(|m| m.id == migration.id) {
            return Err(MigrationError::AlreadyApplied(migration.id.clone()));
        }
        rows.push(migration.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|m| m.id != id);
        if rows.len() == before {
            return Err(MigrationError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear(&self) -> MigrateResult<()> {
        self.rows.write().clear();
        Ok(())
    }
}

/// SQL for the applied-migrations table.
///
/// The engine runs these through the executor, in the same transaction as
/// the migration they record.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    name: String,
}

impl HistoryTable {
    /// Create helpers for the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Statements creating the history table and its index.
    pub fn create_statements(&self) -> Vec<Statement> {
        let table = quote_ident(&self.name);
        vec![
            Statement::new(format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
    id VARCHAR(255) PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    version INTEGER NOT NULL,
    checksum VARCHAR(64) NOT NULL,
    depends_on VARCHAR(255)
);"#
            )),
            Statement::new(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} (applied_at DESC);",
                quote_ident(&format!("{}_applied_at_idx", self.name)),
            )),
        ]
    }

    /// Insert a row for an applied migration.
    pub fn insert(&self, migration: &Migration) -> Statement {
        Statement::with_params(
            format!(
                "INSERT INTO {} (id, name, applied_at, version, checksum, depends_on) VALUES ($1, $2, $3, $4, $5, $6);",
                quote_ident(&self.name)
            ),
            vec![
                Value::from(migration.id.as_str()),
                Value::from(migration.name.as_str()),
                Value::Timestamp(migration.applied_at),
                Value::Int(i64::from(migration.version)),
                Value::from(migration.checksum.as_str()),
                Value::from(migration.depends_on.as_deref()),
            ],
        )
    }

    /// Delete the row of a migration.
    pub fn delete(&self, id: &str) -> Statement {
        Statement::with_params(
            format!("DELETE FROM {} WHERE id = $1;", quote_ident(&self.name)),
            vec![Value::from(id)],
        )
    }

    /// Delete every row.
    pub fn clear(&self) -> Statement {
        Statement::new(format!("DELETE FROM {};", quote_ident(&self.name)))
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TABLE)
    }
}
