//! # Strata
//!
//! A code-first ORM core for Rust.
//!
//! Strata provides:
//! - Entity metadata extracted from language-neutral type descriptors
//! - A unit-of-work change tracker with atomic saves
//! - Model snapshots, rename-aware diffing and dependency-ordered migrations
//! - Migration artifacts, history tracking and drift detection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     strata::logging::init();
//!
//!     let mut registry = EntityRegistry::new();
//!     registry.register(
//!         &TypeDescriptor::new("User")
//!             .field("Id", FieldType::Uuid, "primary_key")
//!             .field("Email", FieldType::String, "unique"),
//!     )?;
//!
//!     let config = StrataConfig::from_file("strata.toml")?;
//!     let engine = MigrationEngine::new(
//!         MigrationConfig::from(&config),
//!         my_executor(config.database_url()),
//!         MemoryHistory::new(),
//!     );
//!     engine.initialize().await?;
//!
//!     engine.add_migration("Init", &registry).await?;
//!     engine.update().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Entity metadata, annotations and configuration.
pub mod schema {
    pub use strata_schema::*;
}

/// Execution contracts and change tracking.
pub mod query {
    pub use strata_query::*;
}

/// Snapshots, diffing and the migration engine.
pub mod migrate {
    pub use strata_migrate::*;
}

pub use strata_query::logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        MemoryHistory, MigrationConfig, MigrationEngine, MigrationError, ModelSnapshot,
        compare,
    };
    pub use crate::query::{
        ChangeTracker, Entity, EntityState, Executor, QueryError, Transaction, Value,
    };
    pub use crate::schema::{EntityRegistry, FieldType, StrataConfig, TypeDescriptor};
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationEngine, MigrationError};
pub use query::{ChangeTracker, QueryError, QueryResult};
pub use schema::{EntityRegistry, SchemaError, SchemaResult};
