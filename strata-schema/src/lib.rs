//! # strata-schema
//!
//! Entity metadata for the Strata ORM.
//!
//! This crate provides:
//! - Language-neutral type descriptors for entity types
//! - Annotation (tag) parsing
//! - Extraction of [`EntityModel`]s: table name, ordered fields, primary key,
//!   nullability/uniqueness/default flags and rename hints
//! - An explicit [`EntityRegistry`] owned by the caller
//! - Configuration parser for `strata.toml` files
//!
//! ## Example
//!
//! ```rust
//! use strata_schema::{EntityRegistry, FieldType, TypeDescriptor};
//!
//! let mut registry = EntityRegistry::new();
//! registry.register(
//!     &TypeDescriptor::new("User")
//!         .field("Id", FieldType::Uuid, "primary_key")
//!         .field("Email", FieldType::String, "unique")
//!         .optional_field("Name", FieldType::String, ""),
//! )?;
//!
//! let user = registry.get("User").unwrap();
//! assert_eq!(user.table_name, "users");
//! assert_eq!(user.primary_key, vec!["Id".to_string()]);
//! # Ok::<(), strata_schema::SchemaError>(())
//! ```

pub mod annotation;
pub mod config;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod registry;
pub mod types;

pub use annotation::Tags;
pub use config::StrataConfig;
pub use descriptor::{FieldDescriptor, TypeDescriptor};
pub use entity::{
    EntityModel, FieldModel, ForeignKeyHint, HintSource, IndexModel, conventional_reference,
    default_table_name,
};
pub use error::{SchemaError, SchemaResult};
pub use registry::EntityRegistry;
pub use types::{DeclaredType, FieldType};
