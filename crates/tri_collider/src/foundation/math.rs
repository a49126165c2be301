//! Math utilities and types
//!
//! Provides the vector, matrix and transform types shared by the collision
//! primitives, the triangle colliders and the scene layer.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Largest representable distance, used as "no hit yet"
pub const MAX_DISTANCE: f32 = f32::MAX;

/// World placement of a scene node: scale, then rotate, then translate.
///
/// Queries are moved into a collider's local space with the inverse of this
/// state. Scale may be non-uniform, so distances measured in local space are
/// not world distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    /// Translation in world space
    pub translation: Vec3,

    /// Scale factors applied before rotation
    pub scale: Vec3,

    /// Orientation quaternion
    pub orientation: Quat,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            orientation: Quat::identity(),
        }
    }
}

impl TransformState {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from its three components
    pub fn new(translation: Vec3, scale: Vec3, orientation: Quat) -> Self {
        Self {
            translation,
            scale,
            orientation,
        }
    }

    /// Create a transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Transform a point by this state
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.orientation * point.component_mul(&self.scale) + self.translation
    }

    /// Transform a direction by scale and rotation only
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.orientation * vector.component_mul(&self.scale)
    }

    /// Transform a vector by rotation only
    pub fn transform_rotation(&self, vector: &Vec3) -> Vec3 {
        self.orientation * vector
    }

    /// Transform a point by the inverse of this state
    pub fn inverse_transform_point(&self, point: &Vec3) -> Vec3 {
        let unrotated = self.orientation.inverse_transform_vector(&(point - self.translation));
        unrotated.component_div(&self.scale)
    }

    /// Transform a direction by the inverse rotation and scale
    pub fn inverse_transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.orientation
            .inverse_transform_vector(vector)
            .component_div(&self.scale)
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.orientation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Compose this (parent) state with a child's local state.
    ///
    /// Exact for uniform parent scale. With non-uniform parent scale and a
    /// rotated child the shear is dropped.
    pub fn combine(&self, child: &TransformState) -> TransformState {
        TransformState {
            translation: self.transform_point(&child.translation),
            scale: self.scale.component_mul(&child.scale),
            orientation: self.orientation * child.orientation,
        }
    }

    /// Get the inverse transform (exact for uniform scale)
    pub fn inverse(&self) -> TransformState {
        let inv_scale = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);
        let inv_orientation = self.orientation.inverse();
        let inv_translation = inv_orientation * (-self.translation).component_mul(&inv_scale);

        TransformState {
            translation: inv_translation,
            scale: inv_scale,
            orientation: inv_orientation,
        }
    }
}
