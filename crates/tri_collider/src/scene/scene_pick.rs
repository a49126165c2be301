//! Ray picking across a scene hierarchy
//!
//! Each query starts at a node and walks its subtree. A node is tested
//! against its own world bounds when its type is in the mask; children are
//! visited only when the ray hits the node's total (subtree) bounds. The
//! closest-hit queries also skip subtrees whose total bounds start beyond the
//! best hit found so far.
//!
//! Rays should carry a unit direction (as built by [`Ray::new`]) so box entry
//! distances and triangle distances are both world lengths.

use crate::collision::intersection::{ray_aabb, ray_aabb_distance};
use crate::collision::Ray;
use crate::spatial::TriPickResult;

use super::scene_graph::{NodeType, SceneView};

/// Triangle hit tagged with the node that owns the collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneTriHit<N> {
    /// Node whose collider produced the hit
    pub node: N,
    /// Hit in world space
    pub result: TriPickResult,
}

/// Node picked by its world bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNodeHit<N> {
    /// Picked node
    pub node: N,
    /// Entry distance into the node's world bounds, 0 when the ray starts inside
    pub distance: f32,
}

/// Append every node in the subtree of `root` whose type is in `types` and
/// whose world bounds the ray hits.
///
/// Returns true if `out` is non-empty afterwards.
pub fn nodes_by_bounds<S: SceneView>(
    scene: &S,
    root: S::Node,
    ray: &Ray,
    types: NodeType,
    out: &mut Vec<S::Node>,
) -> bool {
    collect_nodes(scene, root, ray, types, out);
    !out.is_empty()
}

fn collect_nodes<S: SceneView>(scene: &S, node: S::Node, ray: &Ray, types: NodeType, out: &mut Vec<S::Node>) {
    if types.intersects(scene.node_type(node)) && ray_aabb(&scene.world_bounds(node), ray) {
        out.push(node);
    }

    if ray_aabb(&scene.total_bounds(node), ray) {
        for &child in scene.children(node) {
            collect_nodes(scene, child, ray, types, out);
        }
    }
}

/// Append every triangle hit from the colliders of matching nodes in the
/// subtree of `root`, each tagged with its node.
///
/// Returns true if `out` is non-empty afterwards.
pub fn triangles_from_scene<S: SceneView>(
    scene: &S,
    root: S::Node,
    ray: &Ray,
    types: NodeType,
    out: &mut Vec<SceneTriHit<S::Node>>,
) -> bool {
    let start = out.len();
    let mut hits = Vec::new();
    collect_triangles(scene, root, ray, types, &mut hits, out);
    log::trace!("Scene ray query appended {} triangle hit(s)", out.len() - start);
    !out.is_empty()
}

fn collect_triangles<S: SceneView>(
    scene: &S,
    node: S::Node,
    ray: &Ray,
    types: NodeType,
    scratch: &mut Vec<TriPickResult>,
    out: &mut Vec<SceneTriHit<S::Node>>,
) {
    if types.intersects(scene.node_type(node)) {
        if let Some(collider) = scene.triangle_collider(node) {
            if ray_aabb(&scene.world_bounds(node), ray) {
                scratch.clear();
                collider.intersecting_triangles(ray, &scene.world_transform(node), scratch);
                out.extend(scratch.drain(..).map(|result| SceneTriHit { node, result }));
            }
        }
    }

    if ray_aabb(&scene.total_bounds(node), ray) {
        for &child in scene.children(node) {
            collect_triangles(scene, child, ray, types, scratch, out);
        }
    }
}

/// Nearest matching node in the subtree of `root` by world-bounds entry
/// distance, considering only entries closer than `max_distance`.
///
/// A node whose bounds contain the ray origin is picked at distance 0 only
/// while nothing else has been picked, and does not shorten the search.
pub fn closest_node_by_bounds<S: SceneView>(
    scene: &S,
    root: S::Node,
    ray: &Ray,
    types: NodeType,
    max_distance: f32,
) -> Option<SceneNodeHit<S::Node>> {
    let mut best = None;
    let mut limit = max_distance;
    closest_node(scene, root, ray, types, &mut limit, &mut best);
    best
}

fn closest_node<S: SceneView>(
    scene: &S,
    node: S::Node,
    ray: &Ray,
    types: NodeType,
    limit: &mut f32,
    best: &mut Option<SceneNodeHit<S::Node>>,
) {
    if types.intersects(scene.node_type(node)) {
        if let Some(distance) = ray_aabb_distance(&scene.world_bounds(node), ray) {
            if distance > 0.0 {
                if distance < *limit {
                    *limit = distance;
                    *best = Some(SceneNodeHit { node, distance });
                }
            } else if best.is_none() && distance < *limit {
                *best = Some(SceneNodeHit { node, distance });
            }
        }
    }

    match ray_aabb_distance(&scene.total_bounds(node), ray) {
        Some(entry) if entry < *limit => {
            for &child in scene.children(node) {
                closest_node(scene, child, ray, types, limit, best);
            }
        }
        _ => {}
    }
}

/// Closest triangle hit among the colliders of matching nodes in the
/// subtree of `root`.
///
/// A collider is queried only when its node's world bounds start closer than
/// the best hit so far. Nodes containing the ray origin are always queried.
pub fn closest_tri_from_scene<S: SceneView>(
    scene: &S,
    root: S::Node,
    ray: &Ray,
    types: NodeType,
) -> Option<SceneTriHit<S::Node>> {
    let mut best = None;
    closest_triangle(scene, root, ray, types, &mut best);
    if let Some(hit) = &best {
        log::trace!("Scene pick hit {:?} at {}", hit.node, hit.result.distance);
    }
    best
}

fn best_distance<N: Copy>(best: &Option<SceneTriHit<N>>) -> f32 {
    best.map_or(f32::MAX, |hit| hit.result.distance)
}

fn closest_triangle<S: SceneView>(
    scene: &S,
    node: S::Node,
    ray: &Ray,
    types: NodeType,
    best: &mut Option<SceneTriHit<S::Node>>,
) {
    if types.intersects(scene.node_type(node)) {
        if let Some(collider) = scene.triangle_collider(node) {
            match ray_aabb_distance(&scene.world_bounds(node), ray) {
                Some(entry) if entry < best_distance(best) => {
                    if let Some(result) = collider.closest_triangle(ray, &scene.world_transform(node)) {
                        if result.distance < best_distance(best) {
                            *best = Some(SceneTriHit { node, result });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    match ray_aabb_distance(&scene.total_bounds(node), ray) {
        Some(entry) if entry < best_distance(best) => {
            for &child in scene.children(node) {
                closest_triangle(scene, child, ray, types, best);
            }
        }
        _ => {}
    }
}
