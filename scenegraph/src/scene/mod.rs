//! Scene: a world with a connected hierarchy
//!
//! [`Scene`] is the entry point most callers want. It owns the entity store,
//! keeps the hierarchy hooks connected for its whole lifetime and decides when
//! world transforms are recomputed.

mod tree;

pub use tree::SceneTree;

use crate::config::SceneConfig;
use crate::core::entity::{
    hierarchy, Children, Entity, GlobalTransform, Hierarchy, HierarchyError, Name,
    PropagationStats, Transform, World,
};
use glam::Mat4;
use tracing::{debug, trace, warn};

pub struct Scene {
    world: World,
    tree: SceneTree,
    config: SceneConfig,
    frame: u64,
    last_propagated: Option<u64>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene with the default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        let mut world = World::new();
        let mut tree = SceneTree::new(&config);
        tree.connect(&mut world);
        debug!(config = ?config, "Created scene");
        Self {
            world,
            tree,
            config,
            frame: 0,
            last_propagated: None,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable store access
    ///
    /// Hierarchy hooks stay in force and hierarchy records cannot be mutated
    /// in place; use [`Scene::reparent`] to move an entity.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Spawn a root entity
    pub fn spawn(&mut self, transform: Transform) -> Result<Entity, HierarchyError> {
        self.world.spawn((Hierarchy::root(), transform))
    }

    /// Spawn a named root entity
    pub fn spawn_named(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
    ) -> Result<Entity, HierarchyError> {
        self.world
            .spawn((Hierarchy::root(), transform, Name::new(name)))
    }

    /// Spawn an entity as the last child of `parent`
    pub fn spawn_child(
        &mut self,
        parent: Entity,
        transform: Transform,
    ) -> Result<Entity, HierarchyError> {
        self.world.spawn((Hierarchy::child_of(parent), transform))
    }

    /// Give an existing entity a hierarchy record under `parent`, or as a root
    pub fn attach(&mut self, entity: Entity, parent: Option<Entity>) -> Result<(), HierarchyError> {
        self.world.insert_one(entity, Hierarchy::new(parent))
    }

    /// Remove the hierarchy record of `entity`, leaving the entity alive
    ///
    /// Detaching an entity without a record does nothing.
    pub fn detach(&mut self, entity: Entity) -> Result<(), HierarchyError> {
        if !self.world.contains(entity) {
            return Err(HierarchyError::NoSuchEntity(entity));
        }
        if !self.world.has::<Hierarchy>(entity) {
            trace!(entity = ?entity, "Detach of entity without hierarchy record");
            return Ok(());
        }
        self.warn_orphans(entity);
        self.world.remove_one::<Hierarchy>(entity).map(|_| ())
    }

    /// Move `entity` under `new_parent`, or make it a root when `None`
    pub fn reparent(&mut self, entity: Entity, new_parent: Option<Entity>) -> Result<(), HierarchyError> {
        self.tree.reparent(&mut self.world, entity, new_parent)
    }

    /// Despawn a single entity
    ///
    /// Its children are not touched and end up with a dangling parent link.
    /// Use [`Scene::despawn_recursive`] to remove a whole subtree.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), HierarchyError> {
        self.warn_orphans(entity);
        self.world.despawn(entity)
    }

    /// Despawn `entity` and all of its descendants, children before parents
    ///
    /// Returns the number of entities removed.
    pub fn despawn_recursive(&mut self, entity: Entity) -> Result<usize, HierarchyError> {
        if !self.world.contains(entity) {
            return Err(HierarchyError::NoSuchEntity(entity));
        }
        let descendants = if self.world.has::<Hierarchy>(entity) {
            hierarchy::descendants(self.world.inner(), entity)?
        } else {
            Vec::new()
        };

        // Reversed pre-order puts every node after all of its descendants
        for descendant in descendants.iter().rev() {
            self.world.despawn(*descendant)?;
        }
        self.world.despawn(entity)?;

        let removed = descendants.len() + 1;
        debug!(entity = ?entity, removed, "Despawned subtree");
        Ok(removed)
    }

    fn warn_orphans(&self, entity: Entity) {
        let has_children = self
            .world
            .get::<Hierarchy>(entity)
            .map(|h| h.first_child().is_some())
            .unwrap_or(false);
        if has_children {
            warn!(
                entity = ?entity,
                "Removing hierarchy record of an entity that still has children"
            );
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    /// Children of `entity` in list order
    pub fn children(&self, entity: Entity) -> Result<Children<'_>, HierarchyError> {
        hierarchy::children(self.world.inner(), entity)
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        hierarchy::parent(self.world.inner(), entity)
    }

    pub fn roots(&self) -> Vec<Entity> {
        hierarchy::roots(self.world.inner())
    }

    /// Descendants of `entity` in depth-first pre-order
    pub fn descendants(&self, entity: Entity) -> Result<Vec<Entity>, HierarchyError> {
        hierarchy::descendants(self.world.inner(), entity)
    }

    /// Ancestors of `entity`, nearest first
    pub fn ancestors(&self, entity: Entity) -> Vec<Entity> {
        hierarchy::ancestors(self.world.inner(), entity)
    }

    pub fn is_ancestor(&self, ancestor: Entity, entity: Entity) -> bool {
        hierarchy::is_ancestor(self.world.inner(), ancestor, entity)
    }

    pub fn transform(&self, entity: Entity) -> Option<Transform> {
        self.world.get::<Transform>(entity).ok().map(|t| *t)
    }

    /// Local transform for in-place edits; picked up by the next propagation
    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut Transform> {
        self.world.get_mut::<Transform>(entity).ok()
    }

    /// World matrix written by the last propagation
    pub fn world_transform(&self, entity: Entity) -> Option<Mat4> {
        self.world
            .get::<GlobalTransform>(entity)
            .ok()
            .map(|global| global.matrix)
    }

    pub fn name(&self, entity: Entity) -> Option<String> {
        self.world.get::<Name>(entity).ok().map(|name| name.0.clone())
    }

    /// Check the link invariants of every record
    pub fn validate(&self) -> Vec<HierarchyError> {
        hierarchy::validate(self.world.inner())
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    /// Recompute world transforms for the current frame
    ///
    /// Returns `Ok(None)` when the frame was already propagated and repeated
    /// updates are skipped.
    pub fn update_transforms(&mut self) -> Result<Option<PropagationStats>, HierarchyError> {
        self.update_transforms_with(|_, _| {})
    }

    /// Like [`Scene::update_transforms`], handing each world matrix to `visitor`
    pub fn update_transforms_with(
        &mut self,
        visitor: impl FnMut(Entity, &Mat4),
    ) -> Result<Option<PropagationStats>, HierarchyError> {
        if self.config.skip_repeated_updates && self.last_propagated == Some(self.frame) {
            trace!(frame = self.frame, "Transforms already propagated this frame");
            return Ok(None);
        }
        self.last_propagated = Some(self.frame);

        let result = self.tree.update_with(&mut self.world, visitor);
        if self.config.validate_after_update {
            self.validate();
        }
        result.map(Some)
    }

    /// Advance to the next frame and propagate
    pub fn tick(&mut self) -> Result<Option<PropagationStats>, HierarchyError> {
        self.advance_frame();
        self.update_transforms()
    }

    /// Disconnect the hierarchy hooks and hand back the store
    pub fn teardown(mut self) -> World {
        self.tree.disconnect(&mut self.world);
        debug!(entities = self.world.len(), "Scene torn down");
        self.world
    }
}
