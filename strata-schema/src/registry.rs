//! Entity registry.
//!
//! The registry is an explicit object owned by whoever assembles the model
//! (typically the migration engine or a session). It holds one
//! [`EntityModel`] per registered type, in registration order.

use indexmap::IndexMap;
use tracing::debug;

use crate::descriptor::TypeDescriptor;
use crate::entity::EntityModel;
use crate::error::{SchemaError, SchemaResult};

/// Registered entity models keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: IndexMap<String, EntityModel>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of descriptors.
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a TypeDescriptor>,
    ) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for desc in descriptors {
            registry.register(desc)?;
        }
        Ok(registry)
    }

    /// Extract and register an entity from its descriptor.
    pub fn register(&mut self, descriptor: &TypeDescriptor) -> SchemaResult<&EntityModel> {
        let model = EntityModel::from_descriptor(descriptor)?;
        self.insert(model)
    }

    /// Register an already-extracted entity model.
    pub fn insert(&mut self, model: EntityModel) -> SchemaResult<&EntityModel> {
        if self.entities.contains_key(&model.name) {
            return Err(SchemaError::duplicate("entity", &model.name));
        }
        if let Some(other) = self
            .entities
            .values()
            .find(|e| e.table_name == model.table_name)
        {
            return Err(SchemaError::invalid_entity(
                &model.name,
                format!("table `{}` is already used by `{}`", model.table_name, other.name),
            ));
        }

        debug!(entity = %model.name, table = %model.table_name, "registered entity");
        let name = model.name.clone();
        let (index, _) = self.entities.insert_full(name, model);
        Ok(&self.entities[index])
    }

    /// Get an entity by exact name.
    pub fn get(&self, name: &str) -> Option<&EntityModel> {
        self.entities.get(name)
    }

    /// Find an entity whose name matches case-insensitively.
    pub fn find_ignore_case(&self, name: &str) -> Option<&EntityModel> {
        self.entities
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityModel> {
        self.entities.values()
    }

    /// Entities in registration order, as a vector.
    pub fn models(&self) -> Vec<EntityModel> {
        self.entities.values().cloned().collect()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
