//! Triangle collider interface
//!
//! A triangle collider answers ray and box queries against one or more
//! [`TriangleBuffer`]s in the local space of a scene node. Every query takes
//! the world-space shape plus the node's world [`TransformState`]; the shape
//! is moved into local space, tested, and any distances are reported back in
//! world space.
//!
//! Two backends implement the trait:
//! - [`LinearTriangleCollector`] scans every triangle
//! - [`KdTreeCollider`] walks a KD-tree built over the triangles

use std::fmt::Debug;
use std::sync::Arc;

use crate::collision::{Ray, RayTriangleHit, AABB};
use crate::config::{ColliderConfig, ConfigError};
use crate::foundation::math::TransformState;
use crate::mesh::TriangleBuffer;

use super::kdtree::KdTreeCollider;
use super::linear::LinearTriangleCollector;

/// Closest or intersecting triangle under a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriPickResult {
    /// Index of the buffer within the collider
    pub buffer_index: u32,
    /// Triangle index within that buffer
    pub triangle_index: u32,
    /// Barycentric weight of the first corner
    pub u: f32,
    /// Barycentric weight of the second corner
    pub v: f32,
    /// Barycentric weight of the third corner
    pub w: f32,
    /// World-space distance from the ray origin to the hit point
    pub distance: f32,
}

/// Triangle overlapping a box query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntersectingTriangleResult {
    /// Index of the buffer within the collider
    pub buffer_index: u32,
    /// Triangle index within that buffer
    pub triangle_index: u32,
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderType {
    /// Linear for tiny meshes, KD-tree otherwise
    Auto,
    /// Brute-force scan
    Linear,
    /// KD-tree spatial index
    KdTree,
}

/// Errors raised while building or loading a collider
#[derive(thiserror::Error, Debug)]
pub enum ColliderError {
    /// Serialized data ended early
    #[error("serialized collider truncated at byte {offset}, {needed} more bytes needed")]
    Truncated {
        /// Read position when the data ran out
        offset: usize,
        /// Bytes required by the next field
        needed: usize,
    },

    /// A node names an axis other than 0, 1 or 2
    #[error("invalid split axis {0}")]
    InvalidAxis(u32),

    /// A presence flag is neither 0 nor 1
    #[error("invalid presence flag {0}")]
    InvalidFlag(u32),

    /// A leaf refers past the end of the triangle pool
    #[error("leaf references pool entry {index} of {pool_len}")]
    PoolIndexOutOfRange {
        /// Offending index
        index: u32,
        /// Pool length
        pool_len: usize,
    },

    /// A pool entry refers to a buffer or triangle the collider does not have
    #[error("pool entry refers to missing triangle {triangle_index} in buffer {buffer_index}")]
    MissingTriangle {
        /// Buffer index of the entry
        buffer_index: u32,
        /// Triangle index of the entry
        triangle_index: u32,
    },

    /// Node nesting exceeds the supported depth
    #[error("tree deeper than {0} levels")]
    TooDeep(usize),

    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Query surface shared by the triangle collider backends
pub trait TriangleCollider: Send + Sync + Debug {
    /// True if the ray hits any triangle
    fn check_collision(&self, ray: &Ray, transform: &TransformState) -> bool;

    /// The hit nearest to the ray origin, if any
    fn closest_triangle(&self, ray: &Ray, transform: &TransformState) -> Option<TriPickResult>;

    /// Append every triangle the ray hits to `out`, unsorted.
    ///
    /// Returns true if anything was appended.
    fn intersecting_triangles(
        &self,
        ray: &Ray,
        transform: &TransformState,
        out: &mut Vec<TriPickResult>,
    ) -> bool;

    /// Append every triangle overlapping the world-space box to `out`.
    ///
    /// Returns true if anything was appended.
    fn intersecting_triangles_in_bounds(
        &self,
        aabb: &AABB,
        transform: &TransformState,
        out: &mut Vec<IntersectingTriangleResult>,
    ) -> bool;

    /// Buffers this collider queries
    fn triangle_buffers(&self) -> &[Arc<TriangleBuffer>];

    /// One buffer by index
    fn triangle_buffer(&self, index: usize) -> Option<&Arc<TriangleBuffer>> {
        self.triangle_buffers().get(index)
    }

    /// Number of buffers
    fn triangle_buffer_count(&self) -> usize {
        self.triangle_buffers().len()
    }

    /// Triangles across every buffer
    fn total_triangle_count(&self) -> usize {
        self.triangle_buffers().iter().map(|b| b.triangle_count()).sum()
    }

    /// Which backend this is
    fn collider_type(&self) -> ColliderType;

    /// Build any acceleration data. Must run before querying.
    fn generate_spatial_data(&mut self) {}

    /// Append the acceleration data to `out`
    fn serialize(&self, out: &mut Vec<u8>);

    /// Replace the acceleration data from `bytes`, returning the bytes consumed
    fn deserialize(&mut self, bytes: &[u8]) -> Result<usize, ColliderError>;
}

/// Pick the backend for `buffers` and build it.
pub fn create_triangle_collider(
    buffers: Vec<Arc<TriangleBuffer>>,
    collider_type: ColliderType,
    config: &ColliderConfig,
) -> Result<Box<dyn TriangleCollider>, ColliderError> {
    let mut collider = create_triangle_collider_deferred(buffers, collider_type, config)?;
    collider.generate_spatial_data();
    Ok(collider)
}

/// Pick the backend for `buffers` without building it.
///
/// The caller fills it with [`TriangleCollider::deserialize`] or
/// [`TriangleCollider::generate_spatial_data`].
pub fn create_triangle_collider_deferred(
    buffers: Vec<Arc<TriangleBuffer>>,
    collider_type: ColliderType,
    config: &ColliderConfig,
) -> Result<Box<dyn TriangleCollider>, ColliderError> {
    config.validate()?;

    let triangle_count: usize = buffers.iter().map(|b| b.triangle_count()).sum();
    if triangle_count == 0 {
        log::warn!("Creating triangle collider over {} empty buffer(s)", buffers.len());
    }

    let resolved = match collider_type {
        ColliderType::Auto if triangle_count <= config.auto_linear_max_triangles as usize => ColliderType::Linear,
        ColliderType::Auto => ColliderType::KdTree,
        other => other,
    };

    log::info!(
        "Creating {:?} triangle collider: {} buffer(s), {} triangle(s)",
        resolved,
        buffers.len(),
        triangle_count
    );

    let collider: Box<dyn TriangleCollider> = match resolved {
        ColliderType::Linear => Box::new(LinearTriangleCollector::new(buffers, config.face_culling)),
        _ => Box::new(KdTreeCollider::new(buffers, config.clone())),
    };
    Ok(collider)
}

/// Build a pick result from a local-space hit, measuring the distance in world space.
///
/// Local scale can be non-uniform, so the local ray parameter is not a world
/// distance. The hit point is rebuilt from its barycentric weights instead.
pub(crate) fn world_pick_result(
    ray: &Ray,
    transform: &TransformState,
    buffer: &TriangleBuffer,
    buffer_index: u32,
    triangle_index: u32,
    hit: &RayTriangleHit,
) -> TriPickResult {
    let local_point = buffer
        .triangle(triangle_index as usize)
        .point_from_barycentric(hit.u, hit.v, hit.w);
    let world_point = transform.transform_point(&local_point);

    TriPickResult {
        buffer_index,
        triangle_index,
        u: hit.u,
        v: hit.v,
        w: hit.w,
        distance: (world_point - ray.origin).magnitude(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn triangles(count: usize) -> Arc<TriangleBuffer> {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for i in 0..count {
            let x = i as f32;
            let base = vertices.len() as u32;
            vertices.extend([Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 0.0, 0.0), Vec3::new(x, 1.0, 0.0)]);
            indices.extend([base, base + 1, base + 2]);
        }
        Arc::new(TriangleBuffer::new(vertices, indices).unwrap())
    }

    #[test]
    fn test_auto_picks_backend_by_size() {
        let config = ColliderConfig::default();

        let small = create_triangle_collider(vec![triangles(6)], ColliderType::Auto, &config).unwrap();
        assert_eq!(small.collider_type(), ColliderType::Linear);

        let large = create_triangle_collider(vec![triangles(7)], ColliderType::Auto, &config).unwrap();
        assert_eq!(large.collider_type(), ColliderType::KdTree);

        let forced = create_triangle_collider(vec![triangles(2)], ColliderType::KdTree, &config).unwrap();
        assert_eq!(forced.collider_type(), ColliderType::KdTree);
        assert_eq!(forced.total_triangle_count(), 2);
        assert_eq!(forced.triangle_buffer_count(), 1);
        assert!(forced.triangle_buffer(1).is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ColliderConfig {
            small_mesh_triangles_per_node: 0,
            ..Default::default()
        };
        let result = create_triangle_collider(vec![triangles(1)], ColliderType::Auto, &config);
        assert!(matches!(result, Err(ColliderError::Config(_))));
    }

    #[test]
    fn test_world_distance_under_scale() {
        let buffer = triangles(1);
        let transform = TransformState::new(
            Vec3::zeros(),
            Vec3::new(1.0, 1.0, 4.0),
            crate::foundation::math::Quat::identity(),
        );
        let ray = Ray::new(Vec3::new(0.25, 0.25, -8.0), Vec3::z());
        let hit = RayTriangleHit { u: 0.5, v: 0.25, w: 0.25, t: 2.0 };

        let result = world_pick_result(&ray, &transform, &buffer, 0, 0, &hit);
        approx::assert_relative_eq!(result.distance, 8.0, epsilon = 1e-5);
    }
}
