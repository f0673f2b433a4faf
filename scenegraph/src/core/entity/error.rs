//! Error types for hierarchy maintenance and propagation

use hecs::Entity;
use std::fmt;

/// Which link of a [`Hierarchy`](super::components::Hierarchy) record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Parent,
    FirstChild,
    NextSibling,
    PrevSibling,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Link::Parent => "parent",
            Link::FirstChild => "first_child",
            Link::NextSibling => "next_sibling",
            Link::PrevSibling => "prev_sibling",
        };
        f.write_str(name)
    }
}

/// Errors raised by the hierarchy link table and the transform propagation pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("entity {0:?} does not exist")]
    NoSuchEntity(Entity),

    #[error("cannot attach {entity:?} to {parent:?}: parent is not part of the hierarchy")]
    InvalidParent { entity: Entity, parent: Entity },

    #[error("entity {entity:?} has no {component} component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("entity {0:?} already has a hierarchy record")]
    AlreadyLinked(Entity),

    #[error("entity {0:?} has no hierarchy record")]
    NotLinked(Entity),

    #[error("attaching {entity:?} to {parent:?} would make it its own ancestor")]
    CycleDetected { entity: Entity, parent: Entity },

    #[error("{link} of {entity:?} points to {target:?}, which has no hierarchy record")]
    DanglingReference {
        entity: Entity,
        link: Link,
        target: Entity,
    },

    #[error("{component} of {entity:?} cannot be modified in place")]
    ProtectedComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("hierarchy record of {entity:?} is inconsistent: {reason}")]
    Inconsistent { entity: Entity, reason: &'static str },
}

impl HierarchyError {
    /// Structural errors reject a single mutation and leave the tree untouched
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            HierarchyError::DanglingReference { .. } | HierarchyError::Inconsistent { .. }
        )
    }
}
