//! Error types for execution and change-tracking operations.
//!
//! Error codes follow a pattern: P{category}{number}
//! - 1xxx: Entity errors (missing key, nothing to write)
//! - 3xxx: Connection errors
//! - 4xxx: Transaction errors
//! - 5xxx: Execution errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use strata_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::missing_primary_key("User");
//! assert_eq!(err.code, ErrorCode::MissingPrimaryKey);
//! assert!(err.to_string().starts_with("[P1001]"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Entity errors (1xxx)
    /// Entity has no usable primary key value (P1001).
    MissingPrimaryKey = 1001,
    /// Entity has no columns to write (P1002).
    NothingToWrite = 1002,

    // Connection errors (3xxx)
    /// Database connection failed (P3001).
    ConnectionFailed = 3001,

    // Transaction errors (4xxx)
    /// Transaction failed (P4001).
    TransactionFailed = 4001,
    /// Transaction already committed/rolled back (P4004).
    TransactionClosed = 4004,

    // Execution errors (5xxx)
    /// General database error (P5005).
    DatabaseError = 5005,

    // Internal errors (9xxx)
    /// Internal error (P9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "P1001").
    pub fn code(&self) -> String {
        format!("P{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingPrimaryKey => "Missing primary key",
            Self::NothingToWrite => "Nothing to write",
            Self::ConnectionFailed => "Database connection failed",
            Self::TransactionFailed => "Transaction failed",
            Self::TransactionClosed => "Transaction already closed",
            Self::DatabaseError => "Database error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The entity type involved.
    pub model: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
}

/// Errors that can occur during execution.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a transaction failure.
    pub fn transaction_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, message)
    }

    /// Create an error for an entity that cannot be addressed by key.
    pub fn missing_primary_key(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::MissingPrimaryKey,
            format!("{} has no primary key value; it cannot be updated or deleted", model),
        )
        .with_model(model)
    }

    /// Create an error for an entity with no columns to write.
    pub fn nothing_to_write(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::NothingToWrite,
            format!("{} has no non-key columns to write", model),
        )
        .with_model(model)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Whether this is a transaction-level failure.
    pub fn is_transaction_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::TransactionFailed | ErrorCode::TransactionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::DatabaseError.code(), "P5005");
        assert_eq!(ErrorCode::TransactionFailed.to_string(), "P4001");
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::database("connection reset").with_sql("INSERT INTO x");
        assert_eq!(err.to_string(), "[P5005] connection reset");
        assert_eq!(err.context.sql.as_deref(), Some("INSERT INTO x"));
    }

    #[test]
    fn test_missing_primary_key() {
        let err = QueryError::missing_primary_key("User");
        assert_eq!(err.context.model.as_deref(), Some("User"));
        assert!(!err.is_transaction_error());
        assert!(QueryError::transaction_failed("x").is_transaction_error());
    }

    #[test]
    fn test_with_source() {
        let io = std::io::Error::other("disk");
        let err = QueryError::internal("wrapped").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
