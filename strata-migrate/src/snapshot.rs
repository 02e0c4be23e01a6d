//! Versioned snapshots of the entity model.
//!
//! A [`ModelSnapshot`] is the durable projection of every registered
//! [`EntityModel`] at one point in time. It is written next to the migration
//! artifacts as `ModelSnapshot.json` and is what the next `add_migration`
//! compares against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strata_schema::{EntityModel, FieldModel, FieldType};
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};

/// Default snapshot file name.
pub const SNAPSHOT_FILE: &str = "ModelSnapshot.json";

/// The durable, comparable projection of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Field name.
    pub name: String,
    /// Column name.
    pub column_name: String,
    /// Semantic type.
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Part of the primary key.
    #[serde(default)]
    pub is_primary: bool,
    /// Accepts NULL.
    #[serde(default)]
    pub is_nullable: bool,
    /// Unique constraint.
    #[serde(default)]
    pub is_unique: bool,
    /// Plain index.
    #[serde(default)]
    pub is_indexed: bool,
    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Explicit rename hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
    /// Explicitly referenced entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl FieldSnapshot {
    /// Project a field model.
    pub fn from_model(field: &FieldModel) -> Self {
        Self {
            name: field.name.clone(),
            column_name: field.column_name.clone(),
            ty: field.ty.clone(),
            is_primary: field.is_primary,
            is_nullable: field.is_nullable,
            is_unique: field.is_unique,
            is_indexed: field.is_indexed,
            default_value: field.default_value.clone(),
            old_name: field.old_name.clone(),
            references: field.references.clone(),
        }
    }

    /// Descriptor equality: type, primary, nullable, unique and default.
    ///
    /// Tags (rename hints, references) are not compared.
    pub fn same_descriptor(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.is_primary == other.is_primary
            && self.is_nullable == other.is_nullable
            && self.is_unique == other.is_unique
            && self.default_value == other.default_value
    }

    /// Whether `other` could be this field under a new name: identical type,
    /// nullability, uniqueness and default.
    pub fn rename_compatible(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.is_nullable == other.is_nullable
            && self.is_unique == other.is_unique
            && self.default_value == other.default_value
    }

    /// Entity referenced by the `<Entity>Id` naming convention.
    pub fn conventional_reference(&self) -> Option<&str> {
        strata_schema::conventional_reference(&self.name, &self.ty, self.is_primary)
    }
}

/// An index in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
}

/// One entity in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity name.
    pub name: String,
    /// Table name.
    pub table_name: String,
    /// Fields keyed by name, in declaration order.
    pub fields: IndexMap<String, FieldSnapshot>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexSnapshot>,
}

impl EntitySnapshot {
    /// Project an entity model.
    pub fn from_model(model: &EntityModel) -> Self {
        Self {
            name: model.name.clone(),
            table_name: model.table_name.clone(),
            fields: model
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldSnapshot::from_model(f)))
                .collect(),
            indexes: model
                .indexes()
                .into_iter()
                .map(|i| IndexSnapshot {
                    name: i.name,
                    columns: i.columns,
                    unique: i.unique,
                })
                .collect(),
        }
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSnapshot> {
        self.fields.get(name)
    }

    /// Primary-key fields in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &FieldSnapshot> {
        self.fields.values().filter(|f| f.is_primary)
    }

    /// Column name of the first primary-key field.
    pub fn primary_key_column(&self) -> Option<&str> {
        self.primary_key().next().map(|f| f.column_name.as_str())
    }
}

/// A point-in-time description of the whole entity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Snapshot version; increases by one per generated migration.
    pub version: u32,
    /// When the snapshot was built.
    pub timestamp: DateTime<Utc>,
    /// Content checksum over `entities`.
    pub checksum: String,
    /// Entities keyed by name.
    pub entities: BTreeMap<String, EntitySnapshot>,
}

impl ModelSnapshot {
    /// Build a snapshot (version 1) from entity models.
    pub fn new<'a>(models: impl IntoIterator<Item = &'a EntityModel>) -> Self {
        let entities: BTreeMap<String, EntitySnapshot> = models
            .into_iter()
            .map(|m| (m.name.clone(), EntitySnapshot::from_model(m)))
            .collect();
        Self::from_entities(entities)
    }

    /// Build a snapshot from already projected entities.
    pub fn from_entities(entities: BTreeMap<String, EntitySnapshot>) -> Self {
        let checksum = compute_checksum(&entities);
        Self {
            version: 1,
            timestamp: Utc::now(),
            checksum,
            entities,
        }
    }

    /// Set the version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Get an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntitySnapshot> {
        self.entities.get(name)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the snapshot has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Recompute the checksum from `entities` and compare.
    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.entities) == self.checksum
    }
}

#[derive(Serialize)]
struct CanonicalEntity<'a> {
    name: &'a str,
    table_name: &'a str,
    fields: BTreeMap<&'a str, &'a FieldSnapshot>,
    indexes: Vec<&'a IndexSnapshot>,
}

/// SHA-256 over a canonical rendering of the entities.
///
/// Entities and fields are sorted by name and indexes by index name, so the
/// result depends only on content.
pub fn compute_checksum(entities: &BTreeMap<String, EntitySnapshot>) -> String {
    let canonical: BTreeMap<&str, CanonicalEntity<'_>> = entities
        .iter()
        .map(|(name, entity)| {
            let mut indexes: Vec<&IndexSnapshot> = entity.indexes.iter().collect();
            indexes.sort_by(|a, b| a.name.cmp(&b.name));
            (
                name.as_str(),
                CanonicalEntity {
                    name: &entity.name,
                    table_name: &entity.table_name,
                    fields: entity.fields.iter().map(|(k, v)| (k.as_str(), v)).collect(),
                    indexes,
                },
            )
        })
        .collect();

    let mut hasher = Sha256::new();
    // Serializing borrowed strings and derived structs cannot fail.
    if let Ok(bytes) = serde_json::to_vec(&canonical) {
        hasher.update(&bytes);
    }
    hex::encode(hasher.finalize())
}

/// Reads and writes the snapshot document of a migrations directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store for `<dir>/<file_name>`.
    pub fn new(dir: impl AsRef<Path>, file_name: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    /// Path of the snapshot document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot; `None` when the document does not exist.
    pub async fn load(&self) -> MigrateResult<Option<ModelSnapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no previous snapshot");
                return Ok(None);
            }
            Err(e) => return Err(MigrationError::Io(e)),
        };
        let snapshot: ModelSnapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot, creating the directory if needed.
    pub async fn save(&self, snapshot: &ModelSnapshot) -> MigrateResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), version = snapshot.version, "saved snapshot");
        Ok(())
    }

    /// Delete the snapshot document if it exists.
    pub async fn delete(&self) -> MigrateResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MigrationError::Io(e)),
        }
    }
}
