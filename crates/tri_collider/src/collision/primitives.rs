//! Primitive collision shapes
//!
//! Provides basic geometric primitives (rays, boxes, spheres, planes,
//! triangles). The pairwise tests between them live in
//! [`intersection`](super::intersection).

use crate::foundation::math::{TransformState, Vec3};

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray
    pub origin: Vec3,
    /// The direction of the ray, always normalized
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction.
    ///
    /// A zero direction is replaced with +Z.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = if direction.magnitude_squared() <= f32::EPSILON * f32::EPSILON {
            Vec3::z()
        } else {
            direction.normalize()
        };
        Self { origin, direction }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// This ray moved by `state`
    pub fn transformed(&self, state: &TransformState) -> Ray {
        Ray::new(
            state.transform_point(&self.origin),
            state.transform_vector(&self.direction),
        )
    }

    /// This ray moved into the local space of `state`
    pub fn inverse_transformed(&self, state: &TransformState) -> Ray {
        Ray::new(
            state.inverse_transform_point(&self.origin),
            state.inverse_transform_vector(&self.direction),
        )
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            direction: Vec3::z(),
        }
    }
}

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that contains nothing; adding a point makes it valid
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    /// Create an AABB centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point, or an empty box for no points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.add_point(point);
        }
        aabb
    }

    /// True if min exceeds max on any axis
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Grow the box to contain a point
    pub fn add_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow the box to contain another box
    pub fn merge(&mut self, other: &AABB) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Check if this AABB contains a point (boundary included)
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Closest point on or in the box to `point`
    pub fn closest_point(&self, point: &Vec3) -> Vec3 {
        Vec3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        )
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Bounds of this box after moving its corners by `state`
    pub fn transformed(&self, state: &TransformState) -> AABB {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners().map(|c| state.transform_point(&c));
        AABB::from_points(corners.iter())
    }

    /// Bounds of this box after moving its corners into the local space of `state`
    pub fn inverse_transformed(&self, state: &TransformState) -> AABB {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners().map(|c| state.inverse_transform_point(&c));
        AABB::from_points(corners.iter())
    }
}

/// A bounding sphere for collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Oriented bounding box: a center, three orthonormal axes and half extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OBB {
    /// Box center
    pub center: Vec3,
    /// Local right, up and forward axes
    pub axes: [Vec3; 3],
    /// Half size along each local axis
    pub half_extents: Vec3,
}

impl Default for OBB {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            axes: [Vec3::x(), Vec3::y(), Vec3::z()],
            half_extents: Vec3::new(0.5, 0.5, 0.5),
        }
    }
}

impl OBB {
    /// Create an oriented box
    pub fn new(center: Vec3, axes: [Vec3; 3], half_extents: Vec3) -> Self {
        Self {
            center,
            axes,
            half_extents,
        }
    }

    /// Oriented box with the same volume as an AABB
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            center: aabb.center(),
            axes: [Vec3::x(), Vec3::y(), Vec3::z()],
            half_extents: aabb.extents(),
        }
    }

    /// Closest point on or in the box to `point`
    pub fn closest_point(&self, point: &Vec3) -> Vec3 {
        let offset = point - self.center;
        let mut closest = self.center;
        for (axis, &half) in self.axes.iter().zip(self.half_extents.iter()) {
            let distance = offset.dot(axis).clamp(-half, half);
            closest += axis * distance;
        }
        closest
    }
}

/// Plane satisfying `normal · p = distance`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Offset from the origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane through a point with the given normal
    pub fn from_point_normal(point: &Vec3, normal: &Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    /// Signed distance from the plane to a point, positive in front
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub a: Vec3,
    /// Second vertex
    pub b: Vec3,
    /// Third vertex
    pub c: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized face normal (counter-clockwise front)
    pub fn face_normal(&self) -> Vec3 {
        (self.b - self.a).cross(&(self.c - self.a))
    }

    /// Calculates the unit normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        self.face_normal().normalize()
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Point from barycentric weights `(u, v, w)` on `(a, b, c)`
    pub fn point_from_barycentric(&self, u: f32, v: f32, w: f32) -> Vec3 {
        self.a * u + self.b * v + self.c * w
    }

    /// Bounding box of the three corners
    pub fn bounds(&self) -> AABB {
        AABB::from_points([self.a, self.b, self.c].iter())
    }
}
