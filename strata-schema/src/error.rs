//! Error types for entity metadata extraction and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building entity metadata.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(strata::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An annotation string could not be parsed.
    #[error("malformed annotation on `{entity}.{field}`: {message}")]
    #[diagnostic(
        code(strata::schema::malformed_annotation),
        help("annotations are `key` or `key:value` pairs separated by `;`")
    )]
    MalformedAnnotation {
        entity: String,
        field: String,
        annotation: String,
        message: String,
    },

    /// Invalid entity definition.
    #[error("invalid entity `{name}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_entity))]
    InvalidEntity { name: String, message: String },

    /// Invalid field definition.
    #[error("invalid field `{entity}.{field}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_field))]
    InvalidField {
        entity: String,
        field: String,
        message: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(strata::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(strata::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(strata::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },
}

impl SchemaError {
    /// Create a malformed annotation error.
    pub fn malformed_annotation(
        entity: impl Into<String>,
        field: impl Into<String>,
        annotation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedAnnotation {
            entity: entity.into(),
            field: field.into(),
            annotation: annotation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid entity error.
    pub fn invalid_entity(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }
}
