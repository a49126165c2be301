//! # Tri Collider
//!
//! Triangle-level ray picking and overlap queries for scene meshes.
//!
//! ## Features
//!
//! - **Primitive Tests**: Ray, box, sphere, oriented box, plane and triangle intersection
//! - **Two Backends**: A linear scan for tiny meshes and a KD-tree for everything else
//! - **Binary Save Format**: KD-trees can be serialized and loaded without a rebuild
//! - **Scene Picking**: Closest and all-hit queries over a node hierarchy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tri_collider::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vertices = vec![
//!         Vec3::new(-1.0, -1.0, 0.0),
//!         Vec3::new(-1.0, 1.0, 0.0),
//!         Vec3::new(1.0, -1.0, 0.0),
//!     ];
//!     let buffer = Arc::new(TriangleBuffer::new(vertices, vec![0, 1, 2])?);
//!     let collider = create_triangle_collider(vec![buffer], ColliderType::Auto, &ColliderConfig::default())?;
//!
//!     let ray = Ray::new(Vec3::new(-0.5, -0.5, -5.0), Vec3::z());
//!     if let Some(hit) = collider.closest_triangle(&ray, &TransformState::identity()) {
//!         println!("hit triangle {} at {}", hit.triangle_index, hit.distance);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod collision;
pub mod mesh;
pub mod spatial;
pub mod scene;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        foundation::math::{Quat, TransformState, Vec3},
        config::{ColliderConfig, Config, ConfigError},
        collision::{FaceCulling, Ray, AABB},
        mesh::TriangleBuffer,
        spatial::{
            create_triangle_collider, ColliderError, ColliderType, IntersectingTriangleResult,
            TriPickResult, TriangleCollider,
        },
        scene::{
            closest_node_by_bounds, closest_tri_from_scene, nodes_by_bounds, triangles_from_scene,
            NodeKey, NodeType, SceneGraph, SceneView,
        },
    };
}
