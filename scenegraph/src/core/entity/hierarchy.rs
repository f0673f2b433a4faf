//! Hierarchy link table
//!
//! Every entity taking part in the tree owns a [`Hierarchy`] record. A parent
//! stores its first child; children of the same parent form a doubly linked
//! list through `next_sibling`/`prev_sibling`. The functions here keep those
//! links consistent and are what the lifecycle hooks of a scene invoke:
//! [`link`] on construct, [`unlink`] on destroy, [`reparent`] on demand.
//!
//! Unlinking never recurses into children. Destroying a parent before its
//! children leaves them pointing at a parent without a record; destroy
//! children first (see `Scene::despawn_recursive`) or reparent them.

use super::components::Hierarchy;
use super::error::{HierarchyError, Link};
use hecs::Entity;
use tracing::{debug, error, trace, warn};

fn record(store: &hecs::World, entity: Entity) -> Option<Hierarchy> {
    store.get::<&Hierarchy>(entity).ok().map(|hierarchy| *hierarchy)
}

fn modify(store: &mut hecs::World, entity: Entity, f: impl FnOnce(&mut Hierarchy)) {
    if let Ok(hierarchy) = store.query_one_mut::<&mut Hierarchy>(entity) {
        f(hierarchy);
    }
}

/// Upper bound on any walk along parent or sibling links; a longer walk means a corrupted cycle
fn walk_limit(store: &hecs::World) -> usize {
    store.len() as usize + 1
}

/// Whether `ancestor` is a strict ancestor of `entity`
pub fn is_ancestor(store: &hecs::World, ancestor: Entity, entity: Entity) -> bool {
    let limit = walk_limit(store);
    let mut current = record(store, entity).and_then(|h| h.parent);
    let mut steps = 0;
    while let Some(candidate) = current {
        if candidate == ancestor {
            return true;
        }
        steps += 1;
        if steps > limit {
            error!(entity = ?entity, "Parent chain does not terminate");
            return false;
        }
        current = record(store, candidate).and_then(|h| h.parent);
    }
    false
}

fn validate_parent(
    store: &hecs::World,
    entity: Entity,
    parent: Entity,
    check_cycles: bool,
) -> Result<(), HierarchyError> {
    if parent == entity || !store.contains(parent) || record(store, parent).is_none() {
        return Err(HierarchyError::InvalidParent { entity, parent });
    }
    if check_cycles && is_ancestor(store, entity, parent) {
        return Err(HierarchyError::CycleDetected { entity, parent });
    }
    Ok(())
}

/// Walk a child list to its last node. Stops early at `entity` if it is already in the list.
fn find_tail(
    store: &hecs::World,
    parent: Entity,
    first: Entity,
    entity: Entity,
) -> Result<Entity, HierarchyError> {
    let mut last = first;
    let mut current = record(store, first).ok_or(HierarchyError::DanglingReference {
        entity: parent,
        link: Link::FirstChild,
        target: first,
    })?;

    let limit = walk_limit(store);
    for _ in 0..limit {
        if last == entity {
            return Ok(entity);
        }
        let Some(next) = current.next_sibling else {
            return Ok(last);
        };
        current = record(store, next).ok_or(HierarchyError::DanglingReference {
            entity: last,
            link: Link::NextSibling,
            target: next,
        })?;
        last = next;
    }

    Err(HierarchyError::Inconsistent {
        entity: parent,
        reason: "child list does not terminate",
    })
}

/// Link `entity` into the child list of the parent stored in its record
///
/// Roots are left alone. The entity is appended at the tail of the list. All
/// validation happens before the first write, so on error nothing changed.
pub fn link(store: &mut hecs::World, entity: Entity, check_cycles: bool) -> Result<(), HierarchyError> {
    let hierarchy = record(store, entity).ok_or(HierarchyError::NotLinked(entity))?;
    let Some(parent) = hierarchy.parent else {
        trace!(entity = ?entity, "Attached root entity");
        return Ok(());
    };

    validate_parent(store, entity, parent, check_cycles)?;
    let parent_record = record(store, parent).ok_or(HierarchyError::InvalidParent { entity, parent })?;

    match parent_record.first_child {
        None => {
            modify(store, parent, |p| p.first_child = Some(entity));
        }
        Some(first) => {
            let tail = find_tail(store, parent, first, entity)?;
            if tail == entity {
                trace!(entity = ?entity, parent = ?parent, "Entity already in child list");
                return Ok(());
            }
            modify(store, tail, |t| t.next_sibling = Some(entity));
            modify(store, entity, |e| e.prev_sibling = Some(tail));
        }
    }

    debug!(entity = ?entity, parent = ?parent, "Linked entity under parent");
    Ok(())
}

/// Remove `entity` from its parent's child list
///
/// The entity's own record and its children are left untouched. Entities
/// that are not in any list are ignored.
pub fn unlink(store: &mut hecs::World, entity: Entity) {
    let Some(hierarchy) = record(store, entity) else {
        return;
    };
    if hierarchy.is_unlinked() {
        return;
    }

    let live_prev = hierarchy
        .prev_sibling
        .filter(|prev| record(store, *prev).is_some());

    match live_prev {
        Some(prev) => {
            modify(store, prev, |p| p.next_sibling = hierarchy.next_sibling);
            if let Some(next) = hierarchy.next_sibling {
                modify(store, next, |n| n.prev_sibling = Some(prev));
            }
        }
        None => {
            if let Some(stale) = hierarchy.prev_sibling {
                warn!(
                    entity = ?entity,
                    prev_sibling = ?stale,
                    "Previous sibling has no hierarchy record, treating entity as first child"
                );
            }

            if let Some(parent) = hierarchy.parent {
                match record(store, parent) {
                    Some(parent_record)
                        if hierarchy.prev_sibling.is_some()
                            || parent_record.first_child == Some(entity) =>
                    {
                        modify(store, parent, |p| p.first_child = hierarchy.next_sibling);
                    }
                    Some(_) => {
                        trace!(entity = ?entity, parent = ?parent, "Entity not in parent's child list");
                        return;
                    }
                    None => {
                        warn!(
                            entity = ?entity,
                            parent = ?parent,
                            "Parent has no hierarchy record, it was destroyed before its children"
                        );
                    }
                }
            }

            if let Some(next) = hierarchy.next_sibling {
                modify(store, next, |n| n.prev_sibling = None);
            }
        }
    }

    debug!(entity = ?entity, parent = ?hierarchy.parent, "Unlinked entity");
}

/// Move `entity` under `new_parent`, or make it a root when `None`
///
/// The new parent is validated before the entity leaves its current list, so
/// a rejected call leaves the tree exactly as it was.
pub fn reparent(
    store: &mut hecs::World,
    entity: Entity,
    new_parent: Option<Entity>,
    check_cycles: bool,
) -> Result<(), HierarchyError> {
    let hierarchy = record(store, entity).ok_or(HierarchyError::NotLinked(entity))?;

    if let Some(parent) = new_parent {
        validate_parent(store, entity, parent, check_cycles)?;
        if let Some(first) = record(store, parent).and_then(|p| p.first_child) {
            find_tail(store, parent, first, entity)?;
        }
    }

    unlink(store, entity);
    modify(store, entity, |e| {
        e.parent = None;
        e.next_sibling = None;
        e.prev_sibling = None;
    });

    if let Some(parent) = new_parent {
        modify(store, entity, |e| e.parent = Some(parent));
        link(store, entity, false)?;
    }

    debug!(
        entity = ?entity,
        old_parent = ?hierarchy.parent,
        new_parent = ?new_parent,
        "Reparented entity"
    );
    Ok(())
}

/// Lazy iterator over the children of an entity, in list order
pub struct Children<'w> {
    store: &'w hecs::World,
    next: Option<Entity>,
    remaining: usize,
}

impl Iterator for Children<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next.take()?;
        if self.remaining == 0 {
            error!(entity = ?current, "Child list does not terminate");
            return None;
        }
        self.remaining -= 1;

        match record(self.store, current) {
            Some(hierarchy) => {
                self.next = hierarchy.next_sibling;
                Some(current)
            }
            None => {
                error!(entity = ?current, "Child list references an entity without a hierarchy record");
                None
            }
        }
    }
}

/// Iterate the children of `entity` through `first_child`/`next_sibling`
pub fn children(store: &hecs::World, entity: Entity) -> Result<Children<'_>, HierarchyError> {
    let hierarchy = record(store, entity).ok_or(HierarchyError::NotLinked(entity))?;
    Ok(Children {
        store,
        next: hierarchy.first_child,
        remaining: walk_limit(store),
    })
}

/// Parent of `entity`, if it has a record and is not a root
pub fn parent(store: &hecs::World, entity: Entity) -> Option<Entity> {
    record(store, entity).and_then(|h| h.parent)
}

/// All entities whose record has no parent
pub fn roots(store: &hecs::World) -> Vec<Entity> {
    store
        .query::<&Hierarchy>()
        .iter()
        .filter(|(_, hierarchy)| hierarchy.parent.is_none())
        .map(|(entity, _)| entity)
        .collect()
}

/// Ancestors of `entity`, nearest first
pub fn ancestors(store: &hecs::World, entity: Entity) -> Vec<Entity> {
    let limit = walk_limit(store);
    let mut result = Vec::new();
    let mut current = parent(store, entity);
    while let Some(ancestor) = current {
        if result.len() >= limit {
            error!(entity = ?entity, "Parent chain does not terminate");
            break;
        }
        result.push(ancestor);
        current = parent(store, ancestor);
    }
    result
}

/// Descendants of `entity` in depth-first pre-order, excluding `entity` itself
pub fn descendants(store: &hecs::World, entity: Entity) -> Result<Vec<Entity>, HierarchyError> {
    let hierarchy = record(store, entity).ok_or(HierarchyError::NotLinked(entity))?;
    let limit = walk_limit(store);
    let mut result = Vec::new();
    let mut stack = vec![(entity, Link::FirstChild, hierarchy.first_child)];

    // Each frame holds the link still to follow and the entity owning it
    while let Some((owner, link, next)) = stack.pop() {
        let Some(child) = next else {
            continue;
        };
        let child_record = record(store, child).ok_or(HierarchyError::DanglingReference {
            entity: owner,
            link,
            target: child,
        })?;
        if result.len() >= limit {
            return Err(HierarchyError::Inconsistent {
                entity,
                reason: "subtree does not terminate",
            });
        }
        result.push(child);
        stack.push((child, Link::NextSibling, child_record.next_sibling));
        stack.push((child, Link::FirstChild, child_record.first_child));
    }

    Ok(result)
}

/// Check every hierarchy record against the link invariants
///
/// Returns one error per violation and logs a summary.
pub fn validate(store: &hecs::World) -> Vec<HierarchyError> {
    let mut issues = Vec::new();

    for (entity, hierarchy) in store.query::<&Hierarchy>().iter() {
        let hierarchy = *hierarchy;

        let mut linked = |link: Link, target: Option<Entity>| -> Option<Hierarchy> {
            let target = target?;
            let found = record(store, target);
            if found.is_none() {
                issues.push(HierarchyError::DanglingReference {
                    entity,
                    link,
                    target,
                });
            }
            found
        };

        let parent_record = linked(Link::Parent, hierarchy.parent);
        let first_record = linked(Link::FirstChild, hierarchy.first_child);
        let next_record = linked(Link::NextSibling, hierarchy.next_sibling);
        let prev_record = linked(Link::PrevSibling, hierarchy.prev_sibling);

        let mut inconsistent = |condition: bool, reason: &'static str| {
            if condition {
                issues.push(HierarchyError::Inconsistent { entity, reason });
            }
        };

        if let Some(first) = first_record {
            inconsistent(
                first.parent != Some(entity),
                "first child does not point back to its parent",
            );
            inconsistent(
                first.prev_sibling.is_some(),
                "first child has a previous sibling",
            );
        }
        if let Some(next) = next_record {
            inconsistent(
                next.prev_sibling != Some(entity),
                "next sibling does not link back",
            );
            inconsistent(
                next.parent != hierarchy.parent,
                "next sibling has a different parent",
            );
        }
        if let Some(prev) = prev_record {
            inconsistent(
                prev.next_sibling != Some(entity),
                "previous sibling does not link forward",
            );
        }
        if let (None, Some(parent)) = (hierarchy.prev_sibling, parent_record) {
            inconsistent(
                parent.first_child != Some(entity),
                "no previous sibling but not the parent's first child",
            );
        }

        if let Some(parent) = hierarchy.parent {
            if is_ancestor(store, entity, entity) {
                issues.push(HierarchyError::CycleDetected { entity, parent });
            }
        }
    }

    if issues.is_empty() {
        trace!("Hierarchy validation passed");
    } else {
        for issue in &issues {
            error!(issue = %issue, "Hierarchy validation issue");
        }
        error!("Found {} hierarchy validation issues", issues.len());
    }

    issues
}
