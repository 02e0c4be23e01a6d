//! # strata-migrate
//!
//! Code-first migration engine for the Strata ORM.
//!
//! This crate provides functionality for:
//! - Model snapshots with content checksums, persisted as JSON
//! - Snapshot comparison with rename detection (explicit hints and a
//!   name-similarity heuristic)
//! - Dependency ordering of entities from foreign-key references
//! - Planning ordered, reversible schema operations
//! - SQL generation for PostgreSQL
//! - Migration artifacts on the filesystem and applied-migration history
//! - Transactional application, rollback and drift detection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ Entity Types │────▶│ Model Snapshot │────▶│ Comparison  │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                              │                     │
//!                              ▼                     ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ Dependency Ord │────▶│ Operations  │
//!                      └────────────────┘     └─────────────┘
//!                                                    │
//!                                                    ▼
//!                                            ┌─────────────┐
//!                                            │ Artifact +  │
//!                                            │ History Tbl │
//!                                            └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MemoryHistory, MigrationConfig, MigrationEngine};
//! use strata_schema::{EntityRegistry, FieldType, TypeDescriptor};
//!
//! async fn run(executor: impl strata_query::Executor) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = EntityRegistry::new();
//!     registry.register(
//!         &TypeDescriptor::new("User")
//!             .field("Id", FieldType::Uuid, "primary_key")
//!             .field("Email", FieldType::String, "unique"),
//!     )?;
//!
//!     let config = MigrationConfig::new().migrations_dir("./migrations");
//!     let engine = MigrationEngine::new(config, executor, MemoryHistory::new());
//!     engine.initialize().await?;
//!
//!     let generated = engine.add_migration("Init", &registry).await?;
//!     println!("wrote {}", generated.artifact.id);
//!
//!     let result = engine.update().await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! migrations/
//! ├── 20240115120000_init.json
//! ├── 20240116090000_add_age.json
//! └── ModelSnapshot.json
//! ```

pub mod diff;
pub mod drift;
pub mod engine;
pub mod error;
pub mod file;
pub mod history;
pub mod operation;
pub mod order;
pub mod plan;
pub mod snapshot;
pub mod sql;

// Re-exports
pub use diff::{ChangeKind, RenameDetection, SnapshotChange, SnapshotComparison, compare};
pub use drift::{FieldDrift, SchemaDrift, detect_drift};
pub use engine::{
    GeneratedMigration, MigrationConfig, MigrationEngine, MigrationInfo, MigrationResult,
    MigrationStatus,
};
pub use error::{MigrateResult, MigrationError};
pub use file::{MigrationArtifact, MigrationFileManager, generate_id};
pub use history::{HistoryTable, MemoryHistory, Migration, MigrationHistoryRepository};
pub use operation::{
    AddColumnOperation, AlterColumnOperation, ColumnDefinition, CreateTableOperation,
    DropColumnOperation, DropTableOperation, ForeignKeyReference, IndexDefinition,
    MigrationOperation, OperationKind, RenameColumnOperation,
};
pub use order::{CycleReport, DependencyEdge, DependencyGraph};
pub use plan::{OperationPlanner, PlannedMigration, reverse_operations};
pub use snapshot::{
    EntitySnapshot, FieldSnapshot, IndexSnapshot, ModelSnapshot, SNAPSHOT_FILE, SnapshotStore,
};
pub use sql::PostgresSqlGenerator;
