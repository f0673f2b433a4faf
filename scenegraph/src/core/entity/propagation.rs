//! Transform propagation
//!
//! Walks the forest of hierarchy records from every root, combining each
//! entity's local transform with its parent's world matrix and caching the
//! result in [`GlobalTransform`]. The walk uses an explicit worklist instead
//! of recursion, so deep chains cannot overflow the call stack, and keeps the
//! depth-first pre-order a recursive walk would produce.

use super::components::{GlobalTransform, Hierarchy, Transform};
use super::error::{HierarchyError, Link};
use super::hierarchy;
use glam::Mat4;
use hecs::Entity;
use std::collections::HashSet;
use tracing::{error, trace};

/// Summary of one propagation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Number of roots the pass started from
    pub roots: usize,
    /// Number of entities whose world matrix was written
    pub visited: usize,
}

/// Reusable propagation state
///
/// The worklist and visited set are kept between passes so a steady-state
/// tick does not allocate.
#[derive(Debug, Default)]
pub struct Propagator {
    stack: Vec<(Entity, Mat4)>,
    visited: HashSet<Entity>,
    children: Vec<Entity>,
}

impl Propagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocate the worklist for roughly `capacity` entities
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stack: Vec::with_capacity(capacity),
            visited: HashSet::with_capacity(capacity),
            children: Vec::new(),
        }
    }

    /// Recompute every world matrix
    pub fn run(&mut self, store: &mut hecs::World) -> Result<PropagationStats, HierarchyError> {
        self.run_with(store, |_, _| {})
    }

    /// Recompute every world matrix, calling `visitor` after each entity is written
    ///
    /// A child link naming an entity without a record aborts that subtree
    /// only. The rest of the forest is still propagated and the first such
    /// error is returned once the pass is complete.
    pub fn run_with(
        &mut self,
        store: &mut hecs::World,
        mut visitor: impl FnMut(Entity, &Mat4),
    ) -> Result<PropagationStats, HierarchyError> {
        self.stack.clear();
        self.visited.clear();

        let roots = hierarchy::roots(store);
        let mut stats = PropagationStats {
            roots: roots.len(),
            visited: 0,
        };
        let mut first_error = None;

        for root in roots {
            self.stack.push((root, Mat4::IDENTITY));

            while let Some((entity, parent_world)) = self.stack.pop() {
                if !self.visited.insert(entity) {
                    error!(entity = ?entity, "Entity reached twice during propagation, hierarchy contains a cycle");
                    first_error.get_or_insert(HierarchyError::Inconsistent {
                        entity,
                        reason: "entity reached twice during propagation",
                    });
                    continue;
                }

                let world = match store.get::<&Transform>(entity) {
                    Ok(local) => parent_world * local.to_matrix(),
                    Err(_) => parent_world,
                };

                match store.query_one_mut::<&mut GlobalTransform>(entity) {
                    Ok(global) => global.matrix = world,
                    Err(_) => {
                        if store
                            .insert_one(entity, GlobalTransform::from_matrix(world))
                            .is_err()
                        {
                            continue;
                        }
                    }
                }
                stats.visited += 1;
                visitor(entity, &world);

                if let Err(err) = self.collect_children(store, entity) {
                    error!(entity = ?entity, error = %err, "Skipping rest of subtree");
                    first_error.get_or_insert(err);
                }
                // Reverse so the first child is popped first
                for child in self.children.drain(..).rev() {
                    self.stack.push((child, world));
                }
            }
        }

        trace!(roots = stats.roots, visited = stats.visited, "Propagated transforms");

        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }

    /// Gather the children of `entity` into the scratch buffer, stopping at a dangling link
    fn collect_children(&mut self, store: &hecs::World, entity: Entity) -> Result<(), HierarchyError> {
        self.children.clear();
        let mut owner = entity;
        let mut link = Link::FirstChild;
        let mut next = store
            .get::<&Hierarchy>(entity)
            .ok()
            .and_then(|h| h.first_child);

        while let Some(child) = next {
            let Ok(record) = store.get::<&Hierarchy>(child) else {
                return Err(HierarchyError::DanglingReference {
                    entity: owner,
                    link,
                    target: child,
                });
            };
            if self.children.len() > store.len() as usize {
                return Err(HierarchyError::Inconsistent {
                    entity,
                    reason: "child list does not terminate",
                });
            }
            self.children.push(child);
            next = record.next_sibling;
            owner = child;
            link = Link::NextSibling;
        }
        Ok(())
    }
}
