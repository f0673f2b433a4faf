//! Scene snapshot serialization

mod entity_mapper;
mod snapshot;

pub use entity_mapper::EntityMapper;
pub use snapshot::{SceneSnapshot, SnapshotEntity, SnapshotError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{Entity, Transform};
    use crate::scene::Scene;
    use glam::Vec3;

    fn children(scene: &Scene, entity: Entity) -> Vec<Entity> {
        scene.children(entity).unwrap().collect()
    }

    fn sample_scene() -> (Scene, Entity) {
        let mut scene = Scene::new();
        let root = scene
            .spawn_named("root", Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let a = scene.spawn_child(root, Transform::from_position(Vec3::X)).unwrap();
        scene.spawn_child(root, Transform::from_position(Vec3::Y)).unwrap();
        scene.spawn_child(root, Transform::from_position(Vec3::Z)).unwrap();
        scene.spawn_child(a, Transform::default()).unwrap();
        (scene, root)
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (scene, root) = sample_scene();
        let snapshot = SceneSnapshot::from_scene(&scene).unwrap();
        assert_eq!(snapshot.entities.len(), 5);
        assert_eq!(snapshot.entities[0].name.as_deref(), Some("root"));

        let mut loaded = Scene::new();
        let mapper = snapshot.instantiate(&mut loaded).unwrap();
        assert_eq!(mapper.len(), 5);

        let new_root = mapper.resolve(0).unwrap();
        assert_eq!(loaded.name(new_root).as_deref(), Some("root"));

        // Child order survives
        let original: Vec<_> = children(&scene, root)
            .iter()
            .map(|e| scene.transform(*e).unwrap().position)
            .collect();
        let restored: Vec<_> = children(&loaded, new_root)
            .iter()
            .map(|e| loaded.transform(*e).unwrap().position)
            .collect();
        assert_eq!(original, restored);
        assert!(loaded.validate().is_empty());
    }

    #[test]
    fn test_snapshot_is_pre_order() {
        let (scene, _) = sample_scene();
        let snapshot = SceneSnapshot::from_scene(&scene).unwrap();

        for entry in &snapshot.entities {
            if let Some(parent) = entry.parent {
                assert!(parent < entry.id);
            }
        }
        assert_eq!(snapshot.entities[1].first_child, Some(2));
        assert_eq!(snapshot.entities[1].next_sibling, Some(3));
    }

    #[test]
    fn test_additive_instantiate() {
        let (scene, _) = sample_scene();
        let snapshot = SceneSnapshot::from_scene(&scene).unwrap();

        let mut target = Scene::new();
        let existing = target.spawn(Transform::default()).unwrap();
        let mapper = snapshot.instantiate(&mut target).unwrap();

        assert!(target.contains(existing));
        assert_eq!(target.roots().len(), 2);
        assert_eq!(target.world().len(), 6);
        assert_eq!(target.parent(mapper.resolve(1).unwrap()), mapper.remap(0));
    }

    #[test]
    fn test_unknown_id_rejected_before_spawning() {
        let json = r#"{
            "entities": [
                {"id": 0, "first_child": 7},
                {"id": 1, "parent": 0}
            ]
        }"#;
        let snapshot: SceneSnapshot = serde_json::from_str(json).unwrap();

        let mut scene = Scene::new();
        let err = snapshot.instantiate(&mut scene).unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownId(7)));
        assert!(scene.world().is_empty());
    }

    #[test]
    fn test_unreachable_entity_rejected() {
        let json = r#"{
            "entities": [
                {"id": 0},
                {"id": 1, "parent": 0}
            ]
        }"#;
        let snapshot: SceneSnapshot = serde_json::from_str(json).unwrap();

        let err = snapshot.instantiate(&mut Scene::new()).unwrap_err();
        assert!(matches!(err, SnapshotError::Unreachable(1)));
    }

    #[test]
    fn test_parent_mismatch_rejected() {
        let json = r#"{
            "entities": [
                {"id": 0, "first_child": 2},
                {"id": 1},
                {"id": 2, "parent": 1}
            ]
        }"#;
        let snapshot: SceneSnapshot = serde_json::from_str(json).unwrap();

        let err = snapshot.instantiate(&mut Scene::new()).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::ParentMismatch {
                id: 2,
                listed_under: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot: SceneSnapshot = serde_json::from_str(r#"{"entities": []}"#).unwrap();
        let mut scene = Scene::new();
        let mapper = snapshot.instantiate(&mut scene).unwrap();
        assert!(mapper.is_empty());
        assert!(scene.world().is_empty());
    }

    #[test]
    fn test_snapshot_file_io() {
        let (scene, _) = sample_scene();
        let snapshot = SceneSnapshot::from_scene(&scene).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        snapshot.save_to_file(&path).unwrap();

        let loaded = SceneSnapshot::load_from_file(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }
}
