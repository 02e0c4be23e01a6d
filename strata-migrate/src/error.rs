//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or artifact document could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity metadata error.
    #[error("Schema error: {0}")]
    Schema(#[from] strata_schema::SchemaError),

    /// Execution-layer error, including failed transactions.
    #[error("Database error: {0}")]
    Query(#[from] strata_query::QueryError),

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Migration checksum mismatch.
    #[error("Checksum mismatch for migration '{id}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration ID.
        id: String,
        /// Expected checksum.
        expected: String,
        /// Actual checksum.
        actual: String,
    },

    /// Migration already applied.
    #[error("Migration '{0}' has already been applied")]
    AlreadyApplied(String),

    /// Migration not found.
    #[error("Migration '{0}' not found")]
    NotFound(String),

    /// No changes to migrate.
    #[error("No schema changes detected")]
    NoChanges,

    /// Rollback not possible.
    #[error("Cannot rollback: {0}")]
    RollbackFailed(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create an invalid migration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a rollback error.
    pub fn rollback_failed(msg: impl Into<String>) -> Self {
        Self::RollbackFailed(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AlreadyApplied(_) | Self::NoChanges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::NotFound("20240101120000_init".to_string());
        assert!(err.to_string().contains("20240101120000_init"));
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = MigrationError::ChecksumMismatch {
            id: "init".to_string(),
            expected: "abc".to_string(),
            actual: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(MigrationError::NoChanges.is_recoverable());
        assert!(MigrationError::AlreadyApplied("x".to_string()).is_recoverable());
        assert!(!MigrationError::other("boom").is_recoverable());
    }

    #[test]
    fn test_from_query_error() {
        let err: MigrationError = strata_query::QueryError::database("gone").into();
        assert!(matches!(err, MigrationError::Query(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: MigrationError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, MigrationError::Serialization(_)));
    }
}
