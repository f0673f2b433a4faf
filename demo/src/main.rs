//! Demo: a small orbiting hierarchy driven frame by frame

use scenegraph::prelude::*;
use std::env;
use tracing::{error, info, warn};

const FRAMES: u32 = 4;

fn main() {
    // Initialize logging
    scenegraph::init_logging();
    info!("Starting scene demo");

    let config = match env::args().nth(1) {
        Some(path) => match SceneConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to load config, using defaults");
                SceneConfig::default()
            }
        },
        None => SceneConfig::default(),
    };

    let mut scene = Scene::with_config(config);
    if let Err(e) = run(&mut scene) {
        error!(error = %e, "Demo failed");
        std::process::exit(1);
    }

    let world = scene.teardown();
    info!(entities = world.len(), "Scene demo finished");
}

fn run(scene: &mut Scene) -> Result<(), HierarchyError> {
    let (sun, planet, moon) = create_demo_scene(scene)?;

    for _ in 0..FRAMES {
        advance_orbits(scene, sun, planet);
        scene.tick()?;
        log_positions(scene, &[sun, planet, moon]);
    }

    // Move the moon directly under the sun and show it still follows its new parent
    scene.reparent(moon, Some(sun))?;
    info!("Reparented moon to sun");
    advance_orbits(scene, sun, planet);
    scene.tick()?;
    log_positions(scene, &[sun, planet, moon]);

    let issues = scene.validate();
    if !issues.is_empty() {
        warn!(issues = issues.len(), "Hierarchy has validation issues");
    }
    Ok(())
}

fn create_demo_scene(scene: &mut Scene) -> Result<(Entity, Entity, Entity), HierarchyError> {
    let sun = scene.spawn_named("sun", Transform::default())?;

    let planet = scene.spawn_child(sun, Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))?;
    scene.world_mut().insert_one(planet, Name::new("planet"))?;

    let moon = scene.spawn_child(
        planet,
        Transform::from_position(Vec3::new(2.0, 0.0, 0.0)).with_scale(Vec3::splat(0.25)),
    )?;
    scene.world_mut().insert_one(moon, Name::new("moon"))?;

    info!(entities = scene.world().len(), "Created demo scene");
    Ok((sun, planet, moon))
}

fn advance_orbits(scene: &mut Scene, sun: Entity, planet: Entity) {
    if let Some(transform) = scene.transform_mut(sun) {
        transform.rotation.y += 15.0;
    }
    if let Some(transform) = scene.transform_mut(planet) {
        transform.rotation.y += 45.0;
    }
}

fn log_positions(scene: &Scene, entities: &[Entity]) {
    for entity in entities {
        let Some(matrix) = scene.world_transform(*entity) else {
            continue;
        };
        let position = matrix.w_axis.truncate();
        info!(
            frame = scene.frame(),
            entity = %scene.name(*entity).unwrap_or_default(),
            x = position.x,
            y = position.y,
            z = position.z,
            "World position"
        );
    }
}
