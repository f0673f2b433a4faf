//! End-to-end scene scenarios

use scenegraph::prelude::*;

fn position(scene: &Scene, entity: Entity) -> Vec3 {
    scene.world_transform(entity).unwrap().w_axis.truncate()
}

#[test]
fn test_reparent_grandchild_to_root() {
    let mut scene = Scene::new();
    let a = scene
        .spawn_named("a", Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    let b = scene
        .spawn_child(a, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))
        .unwrap();
    let c = scene
        .spawn_child(b, Transform::from_position(Vec3::new(0.0, 0.0, 1.0)))
        .unwrap();

    scene.tick().unwrap();
    assert!(position(&scene, c).abs_diff_eq(Vec3::new(1.0, 1.0, 1.0), 1e-6));

    scene.reparent(c, Some(a)).unwrap();
    scene.tick().unwrap();

    assert_eq!(scene.children(b).unwrap().count(), 0);
    assert_eq!(scene.children(a).unwrap().collect::<Vec<_>>(), vec![b, c]);
    assert!(position(&scene, c).abs_diff_eq(Vec3::new(1.0, 0.0, 1.0), 1e-6));
    assert!(scene.validate().is_empty());
}

#[test]
fn test_cycle_rejected_and_tree_unchanged() {
    let mut scene = Scene::new();
    let a = scene.spawn(Transform::default()).unwrap();
    let b = scene.spawn_child(a, Transform::default()).unwrap();
    let c = scene.spawn_child(b, Transform::default()).unwrap();

    let err = scene.reparent(a, Some(c)).unwrap_err();
    assert_eq!(err, HierarchyError::CycleDetected { entity: a, parent: c });
    assert!(err.is_recoverable());

    assert_eq!(scene.roots(), vec![a]);
    assert_eq!(scene.descendants(a).unwrap(), vec![b, c]);
    assert_eq!(scene.ancestors(c), vec![b, a]);
    assert!(scene.is_ancestor(a, c));
}

#[test]
fn test_spawn_under_missing_parent_fails_cleanly() {
    let mut scene = Scene::new();
    let gone = scene.spawn(Transform::default()).unwrap();
    scene.despawn(gone).unwrap();

    let err = scene.spawn_child(gone, Transform::default()).unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParent { .. }));
    assert!(scene.world().is_empty());
}

#[test]
fn test_despawning_parent_first_is_reported() {
    let mut scene = Scene::new();
    let parent = scene.spawn(Transform::default()).unwrap();
    let child = scene.spawn_child(parent, Transform::default()).unwrap();

    scene.despawn(parent).unwrap();

    let issues = scene.validate();
    assert_eq!(
        issues,
        vec![HierarchyError::DanglingReference {
            entity: child,
            link: Link::Parent,
            target: parent
        }]
    );

    // The orphan is no longer reachable from a root, so it is skipped
    let stats = scene.tick().unwrap().unwrap();
    assert_eq!(stats.visited, 0);

    // Making it a root repairs the tree
    scene.reparent(child, None).unwrap();
    assert!(scene.validate().is_empty());
    assert_eq!(scene.tick().unwrap().unwrap().visited, 1);
}

#[test]
fn test_snapshot_file_round_trip_preserves_world_transforms() {
    let mut scene = Scene::new();
    let root = scene
        .spawn_named(
            "root",
            Transform::from_position(Vec3::new(5.0, 0.0, 0.0)).with_rotation(Vec3::new(0.0, 0.0, 90.0)),
        )
        .unwrap();
    let arm = scene
        .spawn_child(root, Transform::from_position(Vec3::new(2.0, 0.0, 0.0)))
        .unwrap();
    let hand = scene
        .spawn_child(arm, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    scene.tick().unwrap();
    let expected = position(&scene, hand);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arm.json");
    SceneSnapshot::from_scene(&scene)
        .unwrap()
        .save_to_file(&path)
        .unwrap();

    let mut loaded = Scene::new();
    let mapper = SceneSnapshot::load_from_file(&path)
        .unwrap()
        .instantiate(&mut loaded)
        .unwrap();
    loaded.tick().unwrap();

    let new_hand = mapper.resolve(2).unwrap();
    assert!(position(&loaded, new_hand).abs_diff_eq(expected, 1e-5));
    assert!(expected.abs_diff_eq(Vec3::new(5.0, 3.0, 0.0), 1e-5));
}

#[test]
fn test_config_file_drives_scene() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"skip_repeated_updates": false, "validate_after_update": true}"#)
        .unwrap();

    let config = SceneConfig::load_from_file(&path).unwrap();
    let mut scene = Scene::with_config(config);
    scene.spawn(Transform::default()).unwrap();

    assert!(scene.update_transforms().unwrap().is_some());
    assert!(scene.update_transforms().unwrap().is_some());
}

#[test]
fn test_teardown_returns_world() {
    let mut scene = Scene::new();
    let root = scene.spawn(Transform::default()).unwrap();
    scene.spawn_child(root, Transform::default()).unwrap();

    let world = scene.teardown();
    assert_eq!(world.len(), 2);
    assert!(!world.is_tracked::<Hierarchy>());
}

#[test]
fn test_store_cannot_rewrite_links() {
    let mut scene = Scene::new();
    let a = scene.spawn(Transform::default()).unwrap();
    let b = scene.spawn_child(a, Transform::default()).unwrap();
    let c = scene.spawn_child(a, Transform::default()).unwrap();

    let err = scene
        .world_mut()
        .update::<Hierarchy, _>(c, |h| *h = Hierarchy::child_of(b))
        .unwrap_err();
    assert!(matches!(err, HierarchyError::ProtectedComponent { .. }));

    let err = scene
        .world_mut()
        .get_mut::<Hierarchy>(c)
        .map(|h| *h = Hierarchy::root())
        .unwrap_err();
    assert!(matches!(err, HierarchyError::ProtectedComponent { .. }));

    assert_eq!(scene.children(a).unwrap().collect::<Vec<_>>(), vec![b, c]);
    assert!(scene.validate().is_empty());
    assert_eq!(scene.tick().unwrap().unwrap().visited, 3);

    // Local transforms remain editable through the store
    scene.world_mut().get_mut::<Transform>(c).unwrap().position = Vec3::X;
    scene.tick().unwrap();
    assert!(position(&scene, c).abs_diff_eq(Vec3::X, 1e-6));
}
