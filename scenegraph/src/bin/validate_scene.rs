//! Quick scene snapshot validation utility

use scenegraph::io::SceneSnapshot;
use scenegraph::scene::Scene;
use std::{env, path::Path, process::ExitCode};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(snapshot_path) = args.get(1) else {
        eprintln!("usage: validate_scene <snapshot.json>");
        return ExitCode::FAILURE;
    };

    let path = Path::new(snapshot_path);
    println!("Validating scene: {}", path.display());

    let snapshot = match SceneSnapshot::load_from_file(path) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("✗ Failed to load scene: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("✓ Scene loaded successfully!");
    println!("  Entity count: {}", snapshot.entities.len());

    let mut scene = Scene::new();
    if let Err(e) = snapshot.instantiate(&mut scene) {
        eprintln!("✗ Failed to instantiate scene: {e}");
        return ExitCode::FAILURE;
    }
    println!("✓ Scene instantiated successfully!");

    let issues = scene.validate();
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("✗ {issue}");
        }
        return ExitCode::FAILURE;
    }

    match scene.update_transforms() {
        Ok(stats) => {
            let stats = stats.unwrap_or_default();
            println!("✓ Transforms propagated");
            println!("  Roots: {}", stats.roots);
            println!("  Visited: {}", stats.visited);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to propagate transforms: {e}");
            ExitCode::FAILURE
        }
    }
}
