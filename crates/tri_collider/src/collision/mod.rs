//! Collision primitives and the pairwise tests between them

pub mod primitives;
pub mod intersection;

pub use primitives::{Ray, AABB, BoundingSphere, OBB, Plane, Triangle};
pub use intersection::{FaceCulling, RayTriangleHit};
