//! Triangle colliders
//!
//! Two interchangeable backends behind [`TriangleCollider`]: a linear scan
//! and a KD-tree with a binary save format.

pub mod collider;
pub mod linear;
pub mod kdtree;
mod kdtree_io;

pub use collider::{
    create_triangle_collider, create_triangle_collider_deferred, ColliderError, ColliderType,
    IntersectingTriangleResult, TriPickResult, TriangleCollider,
};
pub use linear::LinearTriangleCollector;
pub use kdtree::{KdNode, KdTreeCollider, KdTreeStats, TriangleData};

#[cfg(test)]
pub(crate) mod tests;
