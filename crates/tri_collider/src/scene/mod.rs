//! Scene hierarchy and ray picking over it

pub mod scene_graph;
pub mod scene_pick;

pub use scene_graph::{NodeKey, NodeType, SceneError, SceneGraph, SceneNode, SceneView};
pub use scene_pick::{
    closest_node_by_bounds, closest_tri_from_scene, nodes_by_bounds, triangles_from_scene, SceneNodeHit, SceneTriHit,
};
