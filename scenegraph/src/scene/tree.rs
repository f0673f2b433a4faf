//! Per-scene hierarchy maintenance
//!
//! A [`SceneTree`] wires the link table into a [`World`]'s lifecycle hooks and
//! owns the propagation state for that world. There is one tree per scene and
//! nothing is shared between scenes.

use crate::config::SceneConfig;
use crate::core::entity::{
    hierarchy, Entity, Hierarchy, HierarchyError, HookId, PropagationStats, Propagator, World,
};
use glam::Mat4;
use tracing::debug;

pub struct SceneTree {
    check_cycles: bool,
    propagator: Propagator,
    hooks: Vec<HookId>,
}

impl SceneTree {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            check_cycles: config.check_cycles,
            propagator: Propagator::with_capacity(config.traversal_capacity),
            hooks: Vec::new(),
        }
    }

    /// Register the hierarchy hooks on `world`
    ///
    /// Adding a [`Hierarchy`] links the entity under its parent, removing it
    /// (or despawning the entity) unlinks it. While connected the record is
    /// protected, so links only change through [`SceneTree::reparent`].
    /// Calling this twice is a no-op.
    pub fn connect(&mut self, world: &mut World) {
        if self.is_connected() {
            return;
        }

        let check_cycles = self.check_cycles;
        self.hooks.push(world.on_construct::<Hierarchy>(move |store, entity| {
            hierarchy::link(store, entity, check_cycles)
        }));
        self.hooks.push(world.on_destroy::<Hierarchy>(|store, entity| {
            hierarchy::unlink(store, entity);
            Ok(())
        }));
        world.protect::<Hierarchy>();

        debug!(check_cycles, "Connected hierarchy hooks");
    }

    /// Remove the hooks this tree registered; hooks added by others stay
    pub fn disconnect(&mut self, world: &mut World) {
        if self.hooks.is_empty() {
            return;
        }
        for id in self.hooks.drain(..) {
            world.remove_hook(id);
        }
        world.unprotect::<Hierarchy>();
        debug!("Disconnected hierarchy hooks");
    }

    pub fn is_connected(&self) -> bool {
        !self.hooks.is_empty()
    }

    pub fn check_cycles(&self) -> bool {
        self.check_cycles
    }

    /// Move `entity` under `new_parent`, or make it a root
    pub fn reparent(
        &self,
        world: &mut World,
        entity: Entity,
        new_parent: Option<Entity>,
    ) -> Result<(), HierarchyError> {
        if !world.contains(entity) {
            return Err(HierarchyError::NoSuchEntity(entity));
        }
        hierarchy::reparent(world.inner_mut(), entity, new_parent, self.check_cycles)
    }

    /// Recompute every world transform
    pub fn update(&mut self, world: &mut World) -> Result<PropagationStats, HierarchyError> {
        self.propagator.run(world.inner_mut())
    }

    /// Recompute every world transform, handing each result to `visitor`
    pub fn update_with(
        &mut self,
        world: &mut World,
        visitor: impl FnMut(Entity, &Mat4),
    ) -> Result<PropagationStats, HierarchyError> {
        self.propagator.run_with(world.inner_mut(), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn connected() -> (World, SceneTree) {
        let mut world = World::new();
        let mut tree = SceneTree::new(&SceneConfig::default());
        tree.connect(&mut world);
        (world, tree)
    }

    fn child_list(world: &World, entity: Entity) -> Vec<Entity> {
        hierarchy::children(world.inner(), entity).unwrap().collect()
    }

    #[test]
    fn test_hooks_link_on_spawn() {
        let (mut world, tree) = connected();
        assert!(tree.is_connected());

        let root = world.spawn((Hierarchy::root(),)).unwrap();
        let a = world.spawn((Hierarchy::child_of(root),)).unwrap();
        let b = world.spawn((Hierarchy::child_of(root),)).unwrap();

        assert_eq!(child_list(&world, root), vec![a, b]);
    }

    #[test]
    fn test_hooks_unlink_on_despawn() {
        let (mut world, _tree) = connected();
        let root = world.spawn((Hierarchy::root(),)).unwrap();
        let a = world.spawn((Hierarchy::child_of(root),)).unwrap();
        let b = world.spawn((Hierarchy::child_of(root),)).unwrap();
        let c = world.spawn((Hierarchy::child_of(root),)).unwrap();

        world.despawn(b).unwrap();
        assert_eq!(child_list(&world, root), vec![a, c]);

        world.remove_one::<Hierarchy>(a).unwrap();
        assert_eq!(child_list(&world, root), vec![c]);
        assert!(hierarchy::validate(world.inner()).is_empty());
    }

    #[test]
    fn test_invalid_parent_rolls_back_spawn() {
        let (mut world, _tree) = connected();
        let plain = world.spawn(()).unwrap();
        let before = world.len();

        let err = world.spawn((Hierarchy::child_of(plain),)).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidParent { .. }));
        assert_eq!(world.len(), before);
    }

    #[test]
    fn test_reattach_appends_at_tail() {
        let (mut world, _tree) = connected();
        let root = world.spawn((Hierarchy::root(),)).unwrap();
        let a = world.spawn((Hierarchy::child_of(root),)).unwrap();
        let b = world.spawn((Hierarchy::child_of(root),)).unwrap();
        let c = world.spawn((Hierarchy::child_of(root),)).unwrap();

        world.remove_one::<Hierarchy>(a).unwrap();
        world.insert_one(a, Hierarchy::child_of(root)).unwrap();

        assert_eq!(child_list(&world, root), vec![b, c, a]);
        assert!(hierarchy::validate(world.inner()).is_empty());
    }

    #[test]
    fn test_disconnect_stops_linking() {
        let (mut world, mut tree) = connected();
        let root = world.spawn((Hierarchy::root(),)).unwrap();
        tree.disconnect(&mut world);
        assert!(!tree.is_connected());

        let child = world.spawn((Hierarchy::child_of(root),)).unwrap();
        assert!(child_list(&world, root).is_empty());
        assert_eq!(hierarchy::parent(world.inner(), child), Some(root));
    }

    #[test]
    fn test_connected_record_cannot_be_rewritten() {
        let (mut world, tree) = connected();
        let a = world.spawn((Hierarchy::root(),)).unwrap();
        let b = world.spawn((Hierarchy::child_of(a),)).unwrap();
        let c = world.spawn((Hierarchy::child_of(a),)).unwrap();

        let err = world
            .update::<Hierarchy, _>(c, |h| *h = Hierarchy::child_of(b))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::ProtectedComponent { entity, .. } if entity == c));
        assert!(matches!(
            world.get_mut::<Hierarchy>(c),
            Err(HierarchyError::ProtectedComponent { .. })
        ));

        assert_eq!(child_list(&world, a), vec![b, c]);
        assert!(child_list(&world, b).is_empty());
        assert!(hierarchy::validate(world.inner()).is_empty());

        // The supported way to move it
        tree.reparent(&mut world, c, Some(b)).unwrap();
        assert_eq!(child_list(&world, b), vec![c]);
        assert!(hierarchy::validate(world.inner()).is_empty());
    }

    #[test]
    fn test_disconnect_keeps_foreign_hooks() {
        let (mut world, mut tree) = connected();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        world.on_construct::<Hierarchy>(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tree.disconnect(&mut world);
        assert!(world.is_tracked::<Hierarchy>());
        assert!(!world.is_protected::<Hierarchy>());

        world.spawn((Hierarchy::root(),)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cycle_check_follows_config() {
        let mut world = World::new();
        let mut tree = SceneTree::new(&SceneConfig {
            check_cycles: false,
            ..Default::default()
        });
        assert!(!tree.check_cycles());
        tree.connect(&mut world);

        // Self-parenting is rejected even without the ancestor walk
        let a = world.spawn((Hierarchy::root(),)).unwrap();
        assert!(matches!(
            tree.reparent(&mut world, a, Some(a)),
            Err(HierarchyError::InvalidParent { .. })
        ));
        assert!(SceneTree::new(&SceneConfig::default()).check_cycles());
    }

    #[test]
    fn test_reparent_missing_entity() {
        let (mut world, tree) = connected();
        let root = world.spawn((Hierarchy::root(),)).unwrap();
        let gone = world.spawn((Hierarchy::root(),)).unwrap();
        world.despawn(gone).unwrap();

        assert_eq!(
            tree.reparent(&mut world, gone, Some(root)),
            Err(HierarchyError::NoSuchEntity(gone))
        );
    }
}
