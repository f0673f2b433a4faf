//! Core components for the scene hierarchy

use glam::{EulerRot, Mat4, Quat, Vec3};
use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Transform component representing position, rotation, and scale in local space
///
/// Rotation is stored as Euler angles in degrees and applied X, then Y, then Z.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,
    /// Euler angles in degrees
    pub rotation: Vec3,
    /// Scale relative to the parent
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with the given position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with the given position and Euler rotation in degrees
    pub fn from_position_rotation(position: Vec3, rotation: Vec3) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Set the Euler rotation in degrees
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the scale of the transform
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotation as a quaternion, rebuilt from the Euler angles
    pub fn rotation_quat(&self) -> Quat {
        let radians = Vec3::new(
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Quat::from_euler(EulerRot::ZYX, radians.z, radians.y, radians.x)
    }

    /// Convert this transform to a local transformation matrix (T * R * S)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    /// Decompose an affine matrix without shear into a transform
    pub fn from_matrix(matrix: Mat4) -> Self {
        let mut transform = Self::default();
        transform.set_from_matrix(matrix);
        transform
    }

    /// Overwrite position, rotation and scale from an affine matrix
    ///
    /// Angles come back in the same Z, Y, X order `to_matrix` applies them,
    /// so the Euler triple may differ from the one that built the matrix
    /// while producing the same rotation.
    pub fn set_from_matrix(&mut self, matrix: Mat4) {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
        self.position = translation;
        self.rotation = Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees());
        self.scale = scale;
    }
}

/// Global transform component holding the cached world-space matrix
///
/// Written only by the propagation pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GlobalTransform {
    /// World-space transformation matrix
    pub matrix: Mat4,
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
        }
    }
}

impl GlobalTransform {
    /// Create a new global transform from a matrix
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    /// Get the world position from the transformation matrix
    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }
}

/// Per-entity hierarchy links
///
/// The parent and its children form an intrusive doubly linked list: the
/// parent points at its first child and siblings point at each other. Only
/// the link table mutates these fields; callers choose the parent when the
/// record is created and go through `reparent` afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hierarchy {
    pub(crate) parent: Option<Entity>,
    pub(crate) first_child: Option<Entity>,
    pub(crate) next_sibling: Option<Entity>,
    pub(crate) prev_sibling: Option<Entity>,
}

impl Hierarchy {
    /// A record that will be linked under `parent`, or become a root when `None`
    pub fn new(parent: Option<Entity>) -> Self {
        Self {
            parent,
            ..Default::default()
        }
    }

    /// A root record
    pub fn root() -> Self {
        Self::default()
    }

    /// A record that will be linked as the last child of `parent`
    pub fn child_of(parent: Entity) -> Self {
        Self::new(Some(parent))
    }

    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    pub fn first_child(&self) -> Option<Entity> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<Entity> {
        self.next_sibling
    }

    pub fn prev_sibling(&self) -> Option<Entity> {
        self.prev_sibling
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True when the record is not part of any parent's child list
    pub(crate) fn is_unlinked(&self) -> bool {
        self.parent.is_none() && self.next_sibling.is_none() && self.prev_sibling.is_none()
    }
}

/// Name component for user-friendly entity identification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    /// Create a new name component
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}
