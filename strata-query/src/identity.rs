//! Identity assignment for tracked entities.
//!
//! An entity with an assigned primary key is keyed `<Type>:<pk>`. One without
//! a key yet is keyed by a structural hash over its hashable non-key values,
//! `<Type>:<hex>`. Two unsaved entities with identical values therefore share
//! a key and are tracked as one; that collision is a known limitation of
//! [`StructuralIdentity`], not something the tracker detects.
//!
//! Once a key is assigned, the same hash gives the entity's provisional key,
//! which lets the tracker move a pending insert under its real key.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::entity::Entity;

/// Key identifying a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(String);

impl EntityKey {
    /// Create a key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Type name prefix of the key.
    pub fn type_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(t, _)| t)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy that derives tracker keys from entity instances.
pub trait IdentityStrategy: Send + Sync {
    /// Compute the key for an entity.
    fn key_for(&self, entity: &dyn Entity) -> EntityKey;

    /// Fingerprint of the entity's full content, used to notice that a
    /// re-attached value changed.
    fn fingerprint(&self, entity: &dyn Entity) -> String {
        content_hash(entity, false)
    }

    /// Key a keyed entity was tracked under before its primary key was
    /// assigned. `None` when the entity has no key yet or the strategy does
    /// not reconcile.
    fn provisional_key(&self, _entity: &dyn Entity) -> Option<EntityKey> {
        None
    }
}

/// Primary key when assigned, structural hash otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralIdentity;

impl IdentityStrategy for StructuralIdentity {
    fn key_for(&self, entity: &dyn Entity) -> EntityKey {
        match entity.key_values() {
            Some(values) => {
                let pk: Vec<String> = values.iter().map(ToString::to_string).collect();
                EntityKey(format!("{}:{}", entity.type_name(), pk.join(",")))
            }
            None => structural_key(entity),
        }
    }

    fn provisional_key(&self, entity: &dyn Entity) -> Option<EntityKey> {
        entity.key_values().map(|_| structural_key(entity))
    }
}

fn structural_key(entity: &dyn Entity) -> EntityKey {
    EntityKey(format!(
        "{}:{}",
        entity.type_name(),
        content_hash(entity, true)
    ))
}

/// SHA-256 over the entity's values, truncated to 16 bytes of hex.
///
/// With `structural` set, primary-key columns are skipped, as are lists,
/// maps, byte buffers, JSON documents and structs containing them (name
/// included).
fn content_hash(entity: &dyn Entity, structural: bool) -> String {
    let pk = entity.primary_key();
    let mut hasher = Sha256::new();
    for (column, value) in entity.values() {
        if structural && (!value.is_hashable() || pk.contains(&column)) {
            continue;
        }
        hasher.update((column.len() as u64).to_be_bytes());
        hasher.update(column.as_bytes());
        if value.is_hashable() {
            value.write_canonical(&mut |bytes: &[u8]| hasher.update(bytes));
        } else {
            hasher.update(value.to_string().as_bytes());
        }
    }
    hex::encode(&hasher.finalize()[..16])
}
