//! Scene hierarchy and transform propagation on top of hecs
//!
//! Entities are arranged in a forest through per-entity [`Hierarchy`]
//! records (parent, first child and sibling links). A [`Scene`] keeps those
//! links consistent as entities are spawned, despawned and reparented, and
//! recomputes every world transform once per frame.
//!
//! [`Hierarchy`]: core::entity::Hierarchy
//! [`Scene`]: scene::Scene

pub mod config;
pub mod core;
pub mod io;
pub mod scene;

// Re-export commonly used types
pub mod prelude {
    // Entity system types
    pub use crate::core::entity::{
        Children, Entity, GlobalTransform, Hierarchy, HierarchyError, LifecycleEvent, Link, Name,
        PropagationStats, Transform, World,
    };

    // Scene types
    pub use crate::scene::{Scene, SceneTree};

    // Math types
    pub use glam::{Mat4, Quat, Vec3};

    // IO types
    pub use crate::io::{EntityMapper, SceneSnapshot, SnapshotError};

    // Config types
    pub use crate::config::{ConfigError, SceneConfig};
}

/// Initialize logging; `RUST_LOG` overrides the default `info` filter
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
