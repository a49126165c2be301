//! Mesh builders and random query helpers shared by the collider tests

use std::f32::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::collision::{Ray, AABB};
use crate::config::ColliderConfig;
use crate::foundation::math::Vec3;
use crate::mesh::TriangleBuffer;
use crate::spatial::{IntersectingTriangleResult, TriPickResult};

/// Axis-aligned cube of side 1 centered at the origin, faces wound outward.
///
/// Triangles 0 and 1 form the -Z face.
pub(crate) fn unit_cube() -> Arc<TriangleBuffer> {
    let vertices = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -Z
        4, 5, 6, 5, 7, 6, // +Z
        0, 4, 2, 2, 4, 6, // -X
        1, 3, 5, 3, 7, 5, // +X
        0, 1, 4, 1, 5, 4, // -Y
        2, 6, 3, 3, 6, 7, // +Y
    ];
    Arc::new(TriangleBuffer::new(vertices, indices).unwrap())
}

/// `n` x `n` quads spanning [-1, 1] on x and y at z = 0, facing +Z
pub(crate) fn grid(n: usize) -> Arc<TriangleBuffer> {
    let step = 2.0 / n as f32;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Vec3::new(-1.0 + i as f32 * step, -1.0 + j as f32 * step, 0.0));
        }
    }

    let row = (n + 1) as u32;
    let mut indices = Vec::with_capacity(n * n * 6);
    for j in 0..n as u32 {
        for i in 0..n as u32 {
            let p00 = j * row + i;
            let p10 = p00 + 1;
            let p01 = p00 + row;
            let p11 = p01 + 1;
            indices.extend([p00, p10, p11, p00, p11, p01]);
        }
    }
    Arc::new(TriangleBuffer::new(vertices, indices).unwrap())
}

/// Latitude/longitude sphere with outward winding
pub(crate) fn uv_sphere(rings: u32, segments: u32, radius: f32) -> Arc<TriangleBuffer> {
    let mut vertices = Vec::new();
    for r in 0..=rings {
        let theta = PI * r as f32 / rings as f32;
        for s in 0..=segments {
            let phi = 2.0 * PI * s as f32 / segments as f32;
            vertices.push(Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()) * radius);
        }
    }

    let row = segments + 1;
    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = r * row + s;
            let b = a + row;
            let c = b + 1;
            let d = a + 1;
            indices.extend([a, c, b, a, d, c]);
        }
    }
    Arc::new(TriangleBuffer::new(vertices, indices).unwrap())
}

/// Small separate triangles along +X, `spacing` apart
pub(crate) fn scattered_triangles(count: usize, spacing: f32) -> Arc<TriangleBuffer> {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for i in 0..count {
        let x = i as f32 * spacing;
        let base = vertices.len() as u32;
        vertices.extend([Vec3::new(x, 0.0, 0.0), Vec3::new(x + 0.5, 0.0, 0.0), Vec3::new(x, 0.5, 0.0)]);
        indices.extend([base, base + 1, base + 2]);
    }
    Arc::new(TriangleBuffer::new(vertices, indices).unwrap())
}

/// Config forcing deep trees on small test meshes
pub(crate) fn small_leaf_config() -> ColliderConfig {
    ColliderConfig {
        small_mesh_triangles_per_node: 4,
        ..Default::default()
    }
}

/// Seeded generator so failures reproduce
pub(crate) fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Ray starting on a sphere of `radius` aimed at a point inside [-0.8, 0.8]^3
pub(crate) fn random_ray(rng: &mut StdRng, radius: f32) -> Ray {
    let z: f32 = rng.gen_range(-1.0..1.0);
    let phi: f32 = rng.gen_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).sqrt();
    let origin = Vec3::new(r * phi.cos(), r * phi.sin(), z) * radius;

    let target = Vec3::new(
        rng.gen_range(-0.8..0.8),
        rng.gen_range(-0.8..0.8),
        rng.gen_range(-0.8..0.8),
    );
    Ray::new(origin, target - origin)
}

/// Box with a random center in [-1.2, 1.2]^3 and half extents in [0.05, 0.6)
pub(crate) fn random_box(rng: &mut StdRng) -> AABB {
    let center = Vec3::new(
        rng.gen_range(-1.2..1.2),
        rng.gen_range(-1.2..1.2),
        rng.gen_range(-1.2..1.2),
    );
    let extents = Vec3::new(
        rng.gen_range(0.05..0.6),
        rng.gen_range(0.05..0.6),
        rng.gen_range(0.05..0.6),
    );
    AABB::from_center_extents(center, extents)
}

/// Sorted (buffer, triangle) keys of ray hits
pub(crate) fn hit_keys(hits: &[TriPickResult]) -> Vec<(u32, u32)> {
    let mut keys: Vec<_> = hits.iter().map(|h| (h.buffer_index, h.triangle_index)).collect();
    keys.sort_unstable();
    keys
}

/// Sorted box query results
pub(crate) fn sorted(mut results: Vec<IntersectingTriangleResult>) -> Vec<IntersectingTriangleResult> {
    results.sort_unstable();
    results
}
