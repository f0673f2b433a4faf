//! Entity ID mapping for scene snapshots

use super::snapshot::SnapshotError;
use hecs::Entity;
use std::collections::HashMap;
use tracing::debug;

/// Maps snapshot IDs to the entities created while instantiating it
///
/// Entity handles are only meaningful inside the store that issued them, so a
/// snapshot refers to entities by its own IDs. The mapper records which handle
/// each ID became, in the order the entities were created.
#[derive(Debug, Default)]
pub struct EntityMapper {
    mapping: HashMap<u64, Entity>,
    order: Vec<u64>,
}

impl EntityMapper {
    /// Create a new empty entity mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping from a snapshot ID to a new entity
    ///
    /// Returns the entity previously mapped to `id`, if any.
    pub fn register(&mut self, id: u64, entity: Entity) -> Option<Entity> {
        debug!(id, entity = ?entity, "Registering entity mapping");
        let previous = self.mapping.insert(id, entity);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Look up the entity created for a snapshot ID
    pub fn remap(&self, id: u64) -> Option<Entity> {
        self.mapping.get(&id).copied()
    }

    /// Like [`EntityMapper::remap`], but an unknown ID is an error
    pub fn resolve(&self, id: u64) -> Result<Entity, SnapshotError> {
        self.remap(id).ok_or(SnapshotError::UnknownId(id))
    }

    /// Get the number of mapped entities
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// (id, entity) pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (u64, Entity)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.mapping.get(id).map(|entity| (*id, *entity)))
    }

    /// Clear all mappings
    pub fn clear(&mut self) {
        self.mapping.clear();
        self.order.clear();
    }
}
