//! Pairwise intersection tests between the collision primitives
//!
//! All tests are stateless and treat touching shapes as intersecting.
//! Distances returned by ray tests are ray parameters; with a normalized ray
//! direction they are distances along the ray.

use serde::{Deserialize, Serialize};

use super::primitives::{BoundingSphere, Plane, Ray, AABB, OBB};
use crate::foundation::math::Vec3;

/// Tolerance for parallel rays and near-zero determinants
pub const EPSILON: f32 = 0.000_01;

/// Which triangle faces a ray test may hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaceCulling {
    /// Reject rays arriving at the back of a triangle
    #[default]
    Back,
    /// Accept hits from either side
    None,
}

/// A ray/triangle hit: barycentric weights on `(a, b, c)` and ray parameter `t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTriangleHit {
    /// Weight of corner `a`
    pub u: f32,
    /// Weight of corner `b`
    pub v: f32,
    /// Weight of corner `c`
    pub w: f32,
    /// Ray parameter of the hit point
    pub t: f32,
}

/// Box/box overlap
pub fn aabb_aabb(a: &AABB, b: &AABB) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x &&
    a.min.y <= b.max.y && a.max.y >= b.min.y &&
    a.min.z <= b.max.z && a.max.z >= b.min.z
}

/// Box/sphere overlap
pub fn aabb_sphere(a: &AABB, b: &BoundingSphere) -> bool {
    let closest = a.closest_point(&b.center);
    (closest - b.center).magnitude_squared() <= b.radius * b.radius
}

/// Box/oriented box overlap
pub fn aabb_obb(a: &AABB, b: &OBB) -> bool {
    obb_obb(&OBB::from_aabb(a), b)
}

/// Box/plane overlap
pub fn aabb_plane(a: &AABB, b: &Plane) -> bool {
    let center = a.center();
    let extents = a.max - center;
    let interval = extents.x * b.normal.x.abs()
        + extents.y * b.normal.y.abs()
        + extents.z * b.normal.z.abs();

    b.signed_distance(&center).abs() <= interval
}

/// Box/triangle overlap using the separating axis test.
///
/// Both shapes are recentred on the box center. Axes are tested in the order
/// 9 edge cross products, 3 box face normals, then the triangle normal.
pub fn aabb_triangle(aabb: &AABB, a: &Vec3, b: &Vec3, c: &Vec3) -> bool {
    let center = aabb.center();
    let e = aabb.extents();

    let v0 = a - center;
    let v1 = b - center;
    let v2 = c - center;

    let edges = [v1 - v0, v2 - v1, v0 - v2];
    let box_axes = [Vec3::x(), Vec3::y(), Vec3::z()];

    for box_axis in &box_axes {
        for edge in &edges {
            let axis = box_axis.cross(edge);
            let p0 = v0.dot(&axis);
            let p1 = v1.dot(&axis);
            let p2 = v2.dot(&axis);
            let r = e.x * axis.x.abs() + e.y * axis.y.abs() + e.z * axis.z.abs();

            let max = p0.max(p1).max(p2);
            let min = p0.min(p1).min(p2);
            if (-max).max(min) > r {
                return false;
            }
        }
    }

    for i in 0..3 {
        let max = v0[i].max(v1[i]).max(v2[i]);
        let min = v0[i].min(v1[i]).min(v2[i]);
        if max < -e[i] || min > e[i] {
            return false;
        }
    }

    let normal = edges[0].cross(&edges[1]);
    let plane_offset = normal.dot(&v0);
    let r = e.x * normal.x.abs() + e.y * normal.y.abs() + e.z * normal.z.abs();
    plane_offset.abs() <= r
}

/// Ray/box test without the distance
pub fn ray_aabb(aabb: &AABB, ray: &Ray) -> bool {
    ray_aabb_distance(aabb, ray).is_some()
}

/// Ray/box slab test returning the entry distance (0 when starting inside).
///
/// Near-zero direction components are compared against the slab bounds
/// instead of being divided.
pub fn ray_aabb_distance(aabb: &AABB, ray: &Ray) -> Option<f32> {
    if aabb.is_empty() {
        return None;
    }

    let mut t_min = 0.0f32;
    let mut t_max = f32::MAX;

    for i in 0..3 {
        let origin = ray.origin[i];
        let dir = ray.direction[i];

        if dir.abs() < EPSILON {
            if origin < aabb.min[i] || origin > aabb.max[i] {
                return None;
            }
        } else {
            let ood = 1.0 / dir;
            let mut t1 = (aabb.min[i] - origin) * ood;
            let mut t2 = (aabb.max[i] - origin) * ood;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);

            if t_min > t_max {
                return None;
            }
        }
    }

    Some(t_min)
}

/// Distance from `point` to the surface of `aabb`, measured toward its center.
///
/// Zero when the point is inside the box.
pub fn distance_to_aabb(point: &Vec3, aabb: &AABB) -> f32 {
    let ray = Ray::new(*point, aabb.center() - point);
    ray_aabb_distance(aabb, &ray).unwrap_or(0.0)
}

/// Sphere/sphere overlap
pub fn sphere_sphere(a: &BoundingSphere, b: &BoundingSphere) -> bool {
    let radius_sum = a.radius + b.radius;
    (a.center - b.center).magnitude_squared() <= radius_sum * radius_sum
}

/// Sphere/oriented box overlap
pub fn sphere_obb(a: &BoundingSphere, b: &OBB) -> bool {
    let closest = b.closest_point(&a.center);
    (closest - a.center).magnitude_squared() <= a.radius * a.radius
}

/// Sphere/plane overlap
pub fn sphere_plane(a: &BoundingSphere, b: &Plane) -> bool {
    b.signed_distance(&a.center).abs() <= a.radius
}

/// Oriented box/plane overlap
pub fn obb_plane(a: &OBB, b: &Plane) -> bool {
    let interval = a.half_extents.x * b.normal.dot(&a.axes[0]).abs()
        + a.half_extents.y * b.normal.dot(&a.axes[1]).abs()
        + a.half_extents.z * b.normal.dot(&a.axes[2]).abs();

    b.signed_distance(&a.center).abs() <= interval
}

/// Oriented box/oriented box overlap using the 15-axis separating axis test.
///
/// [`EPSILON`] is added to every absolute rotation term so that near-parallel
/// edge pairs cannot produce a false separating axis.
pub fn obb_obb(a: &OBB, b: &OBB) -> bool {
    let ea = a.half_extents;
    let eb = b.half_extents;

    // Rotation expressing b in a's frame
    let mut r = [[0.0f32; 3]; 3];
    let mut abs_r = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] = a.axes[i].dot(&b.axes[j]);
            abs_r[i][j] = r[i][j].abs() + EPSILON;
        }
    }

    let offset = b.center - a.center;
    let t = [
        offset.dot(&a.axes[0]),
        offset.dot(&a.axes[1]),
        offset.dot(&a.axes[2]),
    ];

    // a's face axes
    for i in 0..3 {
        let ra = ea[i];
        let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
        if t[i].abs() > ra + rb {
            return false;
        }
    }

    // b's face axes
    for j in 0..3 {
        let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
        let rb = eb[j];
        let projected = t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j];
        if projected.abs() > ra + rb {
            return false;
        }
    }

    // Edge cross products a_i x b_j
    for i in 0..3 {
        let i1 = (i + 1) % 3;
        let i2 = (i + 2) % 3;
        for j in 0..3 {
            let j1 = (j + 1) % 3;
            let j2 = (j + 2) % 3;

            let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
            let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
            let projected = t[i2] * r[i1][j] - t[i1] * r[i2][j];
            if projected.abs() > ra + rb {
                return false;
            }
        }
    }

    true
}

/// Ray/oriented box slab test.
///
/// Returns the entry distance, or the exit distance when the ray starts
/// inside the box.
pub fn ray_obb(obb: &OBB, ray: &Ray) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::MAX;
    let rel_center = obb.center - ray.origin;

    for i in 0..3 {
        let half = obb.half_extents[i];
        let e = obb.axes[i].dot(&rel_center);
        let f = obb.axes[i].dot(&ray.direction);

        if f.abs() < EPSILON {
            if -e - half > 0.0 || -e + half < 0.0 {
                return None;
            }
        } else {
            let mut t1 = (e + half) / f;
            let mut t2 = (e - half) / f;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);

            if t_min > t_max || t_max < 0.0 {
                return None;
            }
        }
    }

    Some(if t_min > 0.0 { t_min } else { t_max })
}

/// Ray/sphere test, clamped to 0 when the ray starts inside the sphere
pub fn ray_sphere(sphere: &BoundingSphere, ray: &Ray) -> Option<f32> {
    let m = ray.origin - sphere.center;
    let b = m.dot(&ray.direction);
    let c = m.dot(&m) - sphere.radius * sphere.radius;

    // Outside and pointing away
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    Some((-b - discriminant.sqrt()).max(0.0))
}

/// Ray/plane test against the plane's front face
pub fn ray_plane(plane: &Plane, ray: &Ray) -> Option<f32> {
    let denom = plane.normal.dot(&ray.direction);

    if denom.abs() < EPSILON || denom > 0.0 {
        return None;
    }

    let t = (plane.distance - plane.normal.dot(&ray.origin)) / denom;
    (t >= 0.0).then_some(t)
}

/// Ray/triangle test returning barycentric weights and the ray parameter.
///
/// The front face is counter-clockwise. With [`FaceCulling::Back`] a ray whose
/// signed determinant is below [`EPSILON`] is rejected; with
/// [`FaceCulling::None`] back faces are tested as the reversed triangle.
pub fn ray_triangle(a: &Vec3, b: &Vec3, c: &Vec3, ray: &Ray, culling: FaceCulling) -> Option<RayTriangleHit> {
    match ray_triangle_front(a, b, c, ray) {
        Some(hit) => Some(hit),
        None if culling == FaceCulling::None => {
            // (a, c, b) swaps the roles of v and w
            ray_triangle_front(a, c, b, ray).map(|hit| RayTriangleHit {
                u: hit.u,
                v: hit.w,
                w: hit.v,
                t: hit.t,
            })
        }
        None => None,
    }
}

/// Bool-only ray/triangle test
pub fn ray_intersects_triangle(a: &Vec3, b: &Vec3, c: &Vec3, ray: &Ray, culling: FaceCulling) -> bool {
    ray_triangle(a, b, c, ray, culling).is_some()
}

fn ray_triangle_front(a: &Vec3, b: &Vec3, c: &Vec3, ray: &Ray) -> Option<RayTriangleHit> {
    let ab = b - a;
    let ac = c - a;
    let qp = -ray.direction;

    let n = ab.cross(&ac);
    let d = qp.dot(&n);
    if d < EPSILON {
        return None;
    }

    let ap = ray.origin - a;
    let t = ap.dot(&n);
    if t < 0.0 {
        return None;
    }

    let e = qp.cross(&ap);
    let v = ac.dot(&e);
    if v < 0.0 || v > d {
        return None;
    }
    let w = -ab.dot(&e);
    if w < 0.0 || v + w > d {
        return None;
    }

    let ood = 1.0 / d;
    let v = v * ood;
    let w = w * ood;
    Some(RayTriangleHit {
        u: 1.0 - v - w,
        v,
        w,
        t: t * ood,
    })
}
