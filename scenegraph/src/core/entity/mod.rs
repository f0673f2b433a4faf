//! Entity-Component System (ECS) functionality
//!
//! This module provides the hierarchy components, the link table that keeps
//! parent/child/sibling links consistent, and transform propagation.

pub mod components;
pub mod error;
pub mod hierarchy;
pub mod propagation;
pub mod world;

// Re-export commonly used types
pub use components::{GlobalTransform, Hierarchy, Name, Transform};
pub use error::{HierarchyError, Link};
pub use hierarchy::Children;
pub use propagation::{PropagationStats, Propagator};
pub use world::{HookId, LifecycleEvent, LifecycleHook, World};

// Re-export hecs types that users will need
pub use hecs::Entity;
