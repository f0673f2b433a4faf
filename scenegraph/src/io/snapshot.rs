//! Scene snapshots: the hierarchy and local transforms as plain data

use super::entity_mapper::EntityMapper;
use crate::core::entity::{Entity, Hierarchy, HierarchyError, Name, Transform};
use crate::scene::Scene;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Errors raised while capturing, loading or instantiating a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("snapshot refers to unknown entity id {0}")]
    UnknownId(u64),

    #[error("entity id {0} appears more than once")]
    DuplicateId(u64),

    #[error("entity id {0} is not reachable from any root")]
    Unreachable(u64),

    #[error("entity id {id} is listed under {listed_under} but names {parent:?} as parent")]
    ParentMismatch {
        id: u64,
        listed_under: u64,
        parent: Option<u64>,
    },
}

/// One entity of a snapshot, its links expressed as snapshot IDs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub first_child: Option<u64>,
    #[serde(default)]
    pub next_sibling: Option<u64>,
    #[serde(default)]
    pub prev_sibling: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

/// Serializable copy of a scene's forest
///
/// Entities are stored in depth-first pre-order, so parents always precede
/// their children and siblings keep their list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub entities: Vec<SnapshotEntity>,
}

impl SceneSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every entity reachable from a root of `scene`
    pub fn from_scene(scene: &Scene) -> Result<Self, SnapshotError> {
        let mut order = Vec::new();
        for root in scene.roots() {
            order.push(root);
            order.extend(scene.descendants(root)?);
        }

        let ids: HashMap<Entity, u64> = order
            .iter()
            .enumerate()
            .map(|(index, entity)| (*entity, index as u64))
            .collect();

        let linked_count = scene.world().view::<Hierarchy>().len();
        if linked_count != order.len() {
            warn!(
                linked = linked_count,
                reachable = order.len(),
                "Some hierarchy records are not reachable from a root and were not captured"
            );
        }

        let id_of = |entity: Option<Entity>| -> Result<Option<u64>, SnapshotError> {
            match entity {
                None => Ok(None),
                Some(entity) => ids
                    .get(&entity)
                    .copied()
                    .map(Some)
                    .ok_or(SnapshotError::Hierarchy(HierarchyError::NotLinked(entity))),
            }
        };

        let mut entities = Vec::with_capacity(order.len());
        for (index, entity) in order.iter().enumerate() {
            let hierarchy = scene
                .world()
                .get::<Hierarchy>(*entity)
                .map(|h| *h)
                .map_err(|_| HierarchyError::NotLinked(*entity))?;

            entities.push(SnapshotEntity {
                id: index as u64,
                name: scene.name(*entity),
                parent: id_of(hierarchy.parent())?,
                first_child: id_of(hierarchy.first_child())?,
                next_sibling: id_of(hierarchy.next_sibling())?,
                prev_sibling: id_of(hierarchy.prev_sibling())?,
                transform: scene.transform(*entity),
            });
        }

        info!(entity_count = entities.len(), "Captured scene snapshot");
        Ok(Self { entities })
    }

    /// Spawn the snapshot's entities into `scene`
    ///
    /// Roots are added as new roots next to whatever the scene already holds.
    /// Children are attached in the snapshot's sibling order, so child lists
    /// come out in the same order they were captured in. The whole snapshot is
    /// checked before the first entity is spawned.
    pub fn instantiate(&self, scene: &mut Scene) -> Result<EntityMapper, SnapshotError> {
        let order = self.spawn_order()?;
        info!(entity_count = order.len(), "Instantiating scene snapshot");

        let mut mapper = EntityMapper::new();
        for entry in order {
            let parent = entry.parent.map(|id| mapper.resolve(id)).transpose()?;

            let mut builder = hecs::EntityBuilder::new();
            builder.add(Hierarchy::new(parent));
            if let Some(transform) = entry.transform {
                builder.add(transform);
            }
            if let Some(name) = &entry.name {
                builder.add(Name::new(name.clone()));
            }

            let entity = scene.world_mut().spawn(builder.build())?;
            mapper.register(entry.id, entity);
        }

        Ok(mapper)
    }

    /// Depth-first pre-order over the snapshot's own links, checking every ID on the way
    fn spawn_order(&self) -> Result<Vec<&SnapshotEntity>, SnapshotError> {
        let mut by_id = HashMap::with_capacity(self.entities.len());
        for entry in &self.entities {
            if by_id.insert(entry.id, entry).is_some() {
                return Err(SnapshotError::DuplicateId(entry.id));
            }
        }
        let lookup = |id: u64| by_id.get(&id).copied().ok_or(SnapshotError::UnknownId(id));

        for entry in &self.entities {
            for id in [entry.parent, entry.prev_sibling].into_iter().flatten() {
                lookup(id)?;
            }
        }

        let mut order = Vec::with_capacity(self.entities.len());
        let mut visited = HashSet::with_capacity(self.entities.len());
        let mut stack = Vec::new();

        for root in self.entities.iter().filter(|entry| entry.parent.is_none()) {
            stack.push(root);
            while let Some(entry) = stack.pop() {
                if !visited.insert(entry.id) {
                    return Err(SnapshotError::DuplicateId(entry.id));
                }
                order.push(entry);

                let mut children = Vec::new();
                let mut next = entry.first_child;
                while let Some(id) = next {
                    let child = lookup(id)?;
                    if child.parent != Some(entry.id) {
                        return Err(SnapshotError::ParentMismatch {
                            id,
                            listed_under: entry.id,
                            parent: child.parent,
                        });
                    }
                    if children.len() > self.entities.len() {
                        return Err(SnapshotError::DuplicateId(id));
                    }
                    children.push(child);
                    next = child.next_sibling;
                }
                stack.extend(children.into_iter().rev());
            }
        }

        if let Some(missing) = self.entities.iter().find(|entry| !visited.contains(&entry.id)) {
            return Err(SnapshotError::Unreachable(missing.id));
        }

        debug!(entity_count = order.len(), "Validated snapshot links");
        Ok(order)
    }

    /// Save the snapshot as pretty-printed JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = ?path, entity_count = self.entities.len(), "Saved scene snapshot");
        Ok(())
    }

    /// Load a snapshot from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&json)?;
        info!(path = ?path, entity_count = snapshot.entities.len(), "Loaded scene snapshot");
        Ok(snapshot)
    }
}
