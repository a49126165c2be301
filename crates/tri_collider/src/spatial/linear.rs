//! Brute-force triangle collider
//!
//! Tests every triangle of every buffer. Cost is linear in the triangle
//! count, but there is no build step, which suits tiny meshes. It also serves
//! as the reference result for the KD-tree.

use std::sync::Arc;

use crate::collision::intersection::{aabb_triangle, ray_triangle};
use crate::collision::{FaceCulling, Ray, AABB};
use crate::foundation::math::TransformState;
use crate::mesh::TriangleBuffer;

use super::collider::{
    world_pick_result, ColliderError, ColliderType, IntersectingTriangleResult, TriPickResult, TriangleCollider,
};

/// Collider that scans every triangle per query
#[derive(Debug, Clone)]
pub struct LinearTriangleCollector {
    buffers: Vec<Arc<TriangleBuffer>>,
    culling: FaceCulling,
}

impl LinearTriangleCollector {
    /// Create a collector over `buffers`
    pub fn new(buffers: Vec<Arc<TriangleBuffer>>, culling: FaceCulling) -> Self {
        Self { buffers, culling }
    }

    fn triangles(&self) -> impl Iterator<Item = (u32, &TriangleBuffer, usize)> + '_ {
        self.buffers.iter().enumerate().flat_map(|(buffer_index, buffer)| {
            (0..buffer.triangle_count()).map(move |tri| (buffer_index as u32, buffer.as_ref(), tri))
        })
    }
}

impl TriangleCollider for LinearTriangleCollector {
    fn check_collision(&self, ray: &Ray, transform: &TransformState) -> bool {
        let local_ray = ray.inverse_transformed(transform);

        self.triangles().any(|(_, buffer, tri)| {
            let t = buffer.triangle(tri);
            ray_triangle(&t.a, &t.b, &t.c, &local_ray, self.culling).is_some()
        })
    }

    fn closest_triangle(&self, ray: &Ray, transform: &TransformState) -> Option<TriPickResult> {
        let local_ray = ray.inverse_transformed(transform);
        let mut best = None;
        let mut best_t = f32::MAX;

        for (buffer_index, buffer, tri) in self.triangles() {
            let t = buffer.triangle(tri);
            if let Some(hit) = ray_triangle(&t.a, &t.b, &t.c, &local_ray, self.culling) {
                if hit.t < best_t {
                    best_t = hit.t;
                    best = Some((buffer_index, buffer, tri, hit));
                }
            }
        }

        best.map(|(buffer_index, buffer, tri, hit)| {
            world_pick_result(ray, transform, buffer, buffer_index, tri as u32, &hit)
        })
    }

    fn intersecting_triangles(
        &self,
        ray: &Ray,
        transform: &TransformState,
        out: &mut Vec<TriPickResult>,
    ) -> bool {
        let local_ray = ray.inverse_transformed(transform);
        let start = out.len();

        for (buffer_index, buffer, tri) in self.triangles() {
            let t = buffer.triangle(tri);
            if let Some(hit) = ray_triangle(&t.a, &t.b, &t.c, &local_ray, self.culling) {
                out.push(world_pick_result(ray, transform, buffer, buffer_index, tri as u32, &hit));
            }
        }

        log::trace!("Linear ray query appended {} hit(s)", out.len() - start);
        out.len() > start
    }

    fn intersecting_triangles_in_bounds(
        &self,
        aabb: &AABB,
        transform: &TransformState,
        out: &mut Vec<IntersectingTriangleResult>,
    ) -> bool {
        let local_box = aabb.inverse_transformed(transform);
        let start = out.len();

        for (buffer_index, buffer, tri) in self.triangles() {
            let t = buffer.triangle(tri);
            if aabb_triangle(&local_box, &t.a, &t.b, &t.c) {
                out.push(IntersectingTriangleResult {
                    buffer_index,
                    triangle_index: tri as u32,
                });
            }
        }

        log::trace!("Linear box query appended {} triangle(s)", out.len() - start);
        out.len() > start
    }

    fn triangle_buffers(&self) -> &[Arc<TriangleBuffer>] {
        &self.buffers
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Linear
    }

    fn serialize(&self, _out: &mut Vec<u8>) {}

    fn deserialize(&mut self, _bytes: &[u8]) -> Result<usize, ColliderError> {
        Ok(0)
    }
}
