//! KD-tree triangle collider
//!
//! The tree is built once over every triangle of every buffer. Each node
//! splits the current cell at its midpoint on an axis that cycles x, y, z
//! with depth. A triangle goes to every side holding one of its vertices, so
//! straddling triangles are referenced from several leaves. Leaves store
//! indices into a flat pool of [`TriangleData`] rather than copies.
//!
//! Nodes live in one `Vec` in pre-order and children are arena indices.
//! Queries never mutate the tree; duplicate suppression uses a scratch
//! bitmap created per call.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::collision::intersection::{aabb_aabb, aabb_triangle, ray_triangle};
use crate::collision::{Ray, RayTriangleHit, AABB};
use crate::config::ColliderConfig;
use crate::foundation::math::{TransformState, Vec3};
use crate::mesh::TriangleBuffer;

use super::collider::{
    world_pick_result, ColliderError, ColliderType, IntersectingTriangleResult, TriPickResult, TriangleCollider,
};

/// Deepest node level a tree may contain, root at level 0
pub const MAX_TREE_DEPTH: usize = 1024;

/// Slack when comparing a hit against a split plane crossing
const PLANE_TOLERANCE: f32 = 0.000_1;

/// Reference to one triangle of one of the collider's buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct TriangleData {
    /// Buffer index within the collider
    pub buffer_index: u32,
    /// Triangle index within the buffer
    pub triangle_index: u32,
}

/// One node of the tree
#[derive(Debug, Clone, PartialEq)]
pub struct KdNode {
    pub(crate) axis: u32,
    pub(crate) split_position: f32,
    pub(crate) triangle_indices: Vec<u32>,
    pub(crate) children: [Option<u32>; 2],
}

impl KdNode {
    pub(crate) fn new(axis: u32, split_position: f32) -> Self {
        Self {
            axis,
            split_position,
            triangle_indices: Vec::new(),
            children: [None, None],
        }
    }

    /// Split axis: 0 = x, 1 = y, 2 = z
    pub fn axis(&self) -> u32 {
        self.axis
    }

    /// Split plane position on [`axis`](Self::axis)
    pub fn split_position(&self) -> f32 {
        self.split_position
    }

    /// Pool indices held by a leaf, empty for interior nodes
    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    /// Arena index of the child below the split
    pub fn left(&self) -> Option<u32> {
        self.children[0]
    }

    /// Arena index of the child at or above the split
    pub fn right(&self) -> Option<u32> {
        self.children[1]
    }

    /// A node is a leaf iff it has no children
    pub fn is_leaf(&self) -> bool {
        self.children[0].is_none() && self.children[1].is_none()
    }
}

/// Shape summary of a built tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KdTreeStats {
    /// Total nodes
    pub node_count: usize,
    /// Nodes without children
    pub leaf_count: usize,
    /// Deepest level, root at 0
    pub max_depth: usize,
    /// Largest leaf
    pub max_leaf_triangles: usize,
    /// Leaf references summed, counting duplicates
    pub referenced_triangles: usize,
}

/// Collider backed by a KD-tree
#[derive(Debug, Clone)]
pub struct KdTreeCollider {
    pub(crate) buffers: Vec<Arc<TriangleBuffer>>,
    pub(crate) config: ColliderConfig,
    pub(crate) nodes: Vec<KdNode>,
    pub(crate) pool: Vec<TriangleData>,
    pub(crate) bounds: AABB,
}

impl KdTreeCollider {
    /// Create an unbuilt collider.
    ///
    /// Queries find nothing until [`generate_spatial_data`](TriangleCollider::generate_spatial_data)
    /// or [`deserialize`](TriangleCollider::deserialize) has run.
    pub fn new(buffers: Vec<Arc<TriangleBuffer>>, config: ColliderConfig) -> Self {
        Self {
            buffers,
            config,
            nodes: Vec::new(),
            pool: Vec::new(),
            bounds: AABB::empty(),
        }
    }

    /// Create and build a collider
    pub fn build(buffers: Vec<Arc<TriangleBuffer>>, config: ColliderConfig) -> Self {
        let mut collider = Self::new(buffers, config);
        collider.generate_spatial_data();
        collider
    }

    /// Nodes in pre-order; the root is first
    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    /// The root node, absent when there are no triangles
    pub fn root(&self) -> Option<&KdNode> {
        self.nodes.first()
    }

    /// Flat pool the leaves index into
    pub fn triangle_pool(&self) -> &[TriangleData] {
        &self.pool
    }

    /// Bounds of every buffer vertex
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// Build parameters
    pub fn config(&self) -> &ColliderConfig {
        &self.config
    }

    /// Summarize the tree shape
    pub fn stats(&self) -> KdTreeStats {
        let mut stats = KdTreeStats {
            node_count: self.nodes.len(),
            ..Default::default()
        };
        if self.nodes.is_empty() {
            return stats;
        }

        let mut stack = vec![(0u32, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index as usize];
            stats.max_depth = stats.max_depth.max(depth);
            if node.is_leaf() {
                stats.leaf_count += 1;
                stats.max_leaf_triangles = stats.max_leaf_triangles.max(node.triangle_indices.len());
                stats.referenced_triangles += node.triangle_indices.len();
            }
            stack.extend(node.children.iter().flatten().map(|&child| (child, depth + 1)));
        }
        stats
    }

    pub(crate) fn compute_bounds(buffers: &[Arc<TriangleBuffer>]) -> AABB {
        let mut bounds = AABB::empty();
        for buffer in buffers {
            bounds.merge(&buffer.bounds());
        }
        bounds
    }

    pub(crate) fn triangle_of(&self, pool_index: u32) -> (TriangleData, crate::collision::Triangle) {
        let data = self.pool[pool_index as usize];
        let triangle = self.buffers[data.buffer_index as usize].triangle(data.triangle_index as usize);
        (data, triangle)
    }

    fn build_tree(&mut self) {
        self.nodes.clear();
        self.pool.clear();
        self.bounds = Self::compute_bounds(&self.buffers);

        for (buffer_index, buffer) in self.buffers.iter().enumerate() {
            self.pool.extend((0..buffer.triangle_count()).map(|triangle_index| TriangleData {
                buffer_index: buffer_index as u32,
                triangle_index: triangle_index as u32,
            }));
        }

        if self.pool.is_empty() {
            log::warn!("KD-tree over {} buffer(s) has no triangles", self.buffers.len());
            return;
        }

        let mut builder = TreeBuilder {
            buffers: &self.buffers,
            pool: &self.pool,
            nodes: Vec::new(),
            leaf_threshold: self.config.triangles_per_node(self.pool.len() as u32) as usize,
        };

        let all = (0..self.pool.len() as u32).collect();
        let mut axis_counts = [0, u32::MAX / 2, u32::MAX];
        builder.split_node(all, self.bounds, 0, &mut axis_counts);
        self.nodes = builder.nodes;

        let stats = self.stats();
        log::debug!(
            "Built KD-tree: {} triangles, {} nodes, {} leaves, depth {}, largest leaf {}, {} references",
            self.pool.len(),
            stats.node_count,
            stats.leaf_count,
            stats.max_depth,
            stats.max_leaf_triangles,
            stats.referenced_triangles
        );
    }
}

struct TreeBuilder<'a> {
    buffers: &'a [Arc<TriangleBuffer>],
    pool: &'a [TriangleData],
    nodes: Vec<KdNode>,
    leaf_threshold: usize,
}

impl TreeBuilder<'_> {
    /// Append the subtree for `triangles` in pre-order and return its root index.
    ///
    /// `axis_counts` holds the triangle count last recorded on each axis along
    /// the current path. Once all three agree no axis separates the set.
    fn split_node(&mut self, triangles: Vec<u32>, bounds: AABB, depth: usize, axis_counts: &mut [u32; 3]) -> u32 {
        let axis = depth % 3;
        let split = (bounds.min[axis] + bounds.max[axis]) * 0.5;
        let index = self.nodes.len() as u32;
        self.nodes.push(KdNode::new(axis as u32, split));

        let exhausted = axis_counts[0] == axis_counts[1] && axis_counts[1] == axis_counts[2];
        if exhausted || triangles.len() < self.leaf_threshold || depth + 1 >= MAX_TREE_DEPTH {
            let mut leaf = triangles;
            leaf.shrink_to_fit();
            self.nodes[index as usize].triangle_indices = leaf;
            return index;
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &pool_index in &triangles {
            let data = self.pool[pool_index as usize];
            let buffer = &self.buffers[data.buffer_index as usize];
            let coords = [0, 1, 2].map(|corner| buffer.point(data.triangle_index as usize, corner)[axis]);

            if coords.iter().any(|&c| c < split) {
                left.push(pool_index);
            }
            if coords.iter().any(|&c| c >= split) {
                right.push(pool_index);
            }
        }
        drop(triangles);

        if !left.is_empty() {
            let mut child_bounds = bounds;
            child_bounds.max[axis] = split;
            let saved = axis_counts[axis];
            axis_counts[axis] = left.len() as u32;
            let child = self.split_node(left, child_bounds, depth + 1, axis_counts);
            axis_counts[axis] = saved;
            self.nodes[index as usize].children[0] = Some(child);
        }

        if !right.is_empty() {
            let mut child_bounds = bounds;
            child_bounds.min[axis] = split;
            let saved = axis_counts[axis];
            axis_counts[axis] = right.len() as u32;
            let child = self.split_node(right, child_bounds, depth + 1, axis_counts);
            axis_counts[axis] = saved;
            self.nodes[index as usize].children[1] = Some(child);
        }

        index
    }
}

/// Children of a node in the order a ray meets them
struct Descent {
    near: Option<u32>,
    far: Option<u32>,
    plane_t: f32,
}

/// Front-to-back walk of one local-space ray
struct RayWalk<'a> {
    tree: &'a KdTreeCollider,
    ray: &'a Ray,
    visited: Vec<bool>,
}

impl<'a> RayWalk<'a> {
    fn new(tree: &'a KdTreeCollider, ray: &'a Ray) -> Self {
        Self {
            tree,
            ray,
            visited: vec![false; tree.pool.len()],
        }
    }

    fn descent(&self, node: &KdNode) -> Descent {
        let axis = node.axis as usize;
        let origin = self.ray.origin[axis];
        let direction = self.ray.direction[axis];
        let near_side = usize::from(origin > node.split_position);
        let near = node.children[near_side];
        let far = node.children[1 - near_side];

        if direction == 0.0 {
            // Parallel to the plane: only a ray lying in it can reach both sides
            let far = if origin == node.split_position { far } else { None };
            return Descent { near, far, plane_t: 0.0 };
        }

        let plane_t = (node.split_position - origin) / direction;
        if plane_t >= 0.0 {
            Descent { near, far, plane_t }
        } else {
            Descent { near, far: None, plane_t }
        }
    }

    /// Test a pool entry once per walk
    fn test(&mut self, pool_index: u32) -> Option<RayTriangleHit> {
        let slot = pool_index as usize;
        if self.visited[slot] {
            return None;
        }
        self.visited[slot] = true;

        let (_, tri) = self.tree.triangle_of(pool_index);
        ray_triangle(&tri.a, &tri.b, &tri.c, self.ray, self.tree.config.face_culling)
    }

    fn any(&mut self, index: u32) -> bool {
        let tree = self.tree;
        let node = &tree.nodes[index as usize];
        for &pool_index in &node.triangle_indices {
            if self.test(pool_index).is_some() {
                return true;
            }
        }

        let descent = self.descent(node);
        descent.near.is_some_and(|near| self.any(near)) || descent.far.is_some_and(|far| self.any(far))
    }

    fn collect(&mut self, index: u32, hits: &mut Vec<(u32, RayTriangleHit)>) {
        let tree = self.tree;
        let node = &tree.nodes[index as usize];
        for &pool_index in &node.triangle_indices {
            if let Some(hit) = self.test(pool_index) {
                hits.push((pool_index, hit));
            }
        }

        let descent = self.descent(node);
        if let Some(near) = descent.near {
            self.collect(near, hits);
        }
        if let Some(far) = descent.far {
            self.collect(far, hits);
        }
    }

    /// Ties on `t` go to the lower pool index, matching a linear scan
    fn closest(&mut self, index: u32, best: &mut Option<(u32, RayTriangleHit)>) {
        let tree = self.tree;
        let node = &tree.nodes[index as usize];
        for &pool_index in &node.triangle_indices {
            if let Some(hit) = self.test(pool_index) {
                let better = match best {
                    None => true,
                    Some((best_index, best_hit)) => {
                        hit.t < best_hit.t || (hit.t == best_hit.t && pool_index < *best_index)
                    }
                };
                if better {
                    *best = Some((pool_index, hit));
                }
            }
        }

        let descent = self.descent(node);
        if let Some(near) = descent.near {
            self.closest(near, best);
        }
        if let Some(far) = descent.far {
            // Far-side hits lie beyond the plane crossing
            let settled = best.is_some_and(|(_, hit)| {
                hit.t < descent.plane_t - PLANE_TOLERANCE * (1.0 + descent.plane_t.abs())
            });
            if !settled {
                self.closest(far, best);
            }
        }
    }
}

impl KdTreeCollider {
    fn bounds_walk(
        &self,
        index: u32,
        query: &AABB,
        center: &Vec3,
        near_point: &mut Vec3,
        seen: &mut [bool],
        out: &mut Vec<IntersectingTriangleResult>,
    ) {
        let node = &self.nodes[index as usize];
        for &pool_index in &node.triangle_indices {
            let slot = pool_index as usize;
            if seen[slot] {
                continue;
            }
            seen[slot] = true;

            let (data, tri) = self.triangle_of(pool_index);
            if aabb_triangle(query, &tri.a, &tri.b, &tri.c) {
                out.push(IntersectingTriangleResult {
                    buffer_index: data.buffer_index,
                    triangle_index: data.triangle_index,
                });
            }
        }

        let axis = node.axis as usize;
        let near_side = usize::from(center[axis] > node.split_position);

        if let Some(near) = node.children[near_side] {
            self.bounds_walk(near, query, center, near_point, seen, out);
        }

        if let Some(far) = node.children[1 - near_side] {
            // near_point tracks the point of the current cell closest to the query center
            let saved = near_point[axis];
            near_point[axis] = node.split_position;
            if query.contains_point(near_point) {
                self.bounds_walk(far, query, center, near_point, seen, out);
            }
            near_point[axis] = saved;
        }
    }
}

impl TriangleCollider for KdTreeCollider {
    fn check_collision(&self, ray: &Ray, transform: &TransformState) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let local_ray = ray.inverse_transformed(transform);
        RayWalk::new(self, &local_ray).any(0)
    }

    fn closest_triangle(&self, ray: &Ray, transform: &TransformState) -> Option<TriPickResult> {
        if self.nodes.is_empty() {
            return None;
        }
        let local_ray = ray.inverse_transformed(transform);
        let mut best = None;
        RayWalk::new(self, &local_ray).closest(0, &mut best);

        best.map(|(pool_index, hit)| {
            let data = self.pool[pool_index as usize];
            let buffer = &self.buffers[data.buffer_index as usize];
            world_pick_result(ray, transform, buffer, data.buffer_index, data.triangle_index, &hit)
        })
    }

    fn intersecting_triangles(
        &self,
        ray: &Ray,
        transform: &TransformState,
        out: &mut Vec<TriPickResult>,
    ) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let local_ray = ray.inverse_transformed(transform);
        let mut hits = Vec::new();
        RayWalk::new(self, &local_ray).collect(0, &mut hits);

        out.extend(hits.iter().map(|(pool_index, hit)| {
            let data = self.pool[*pool_index as usize];
            let buffer = &self.buffers[data.buffer_index as usize];
            world_pick_result(ray, transform, buffer, data.buffer_index, data.triangle_index, hit)
        }));

        log::trace!("KD-tree ray query appended {} hit(s)", hits.len());
        !hits.is_empty()
    }

    fn intersecting_triangles_in_bounds(
        &self,
        aabb: &AABB,
        transform: &TransformState,
        out: &mut Vec<IntersectingTriangleResult>,
    ) -> bool {
        if self.nodes.is_empty() {
            return false;
        }

        let local_box = aabb.inverse_transformed(transform);
        if !aabb_aabb(&local_box, &self.bounds) {
            return false;
        }

        let start = out.len();
        let center = local_box.center();
        let mut near_point = center;
        let mut seen = vec![false; self.pool.len()];
        self.bounds_walk(0, &local_box, &center, &mut near_point, &mut seen, out);

        log::trace!("KD-tree box query appended {} triangle(s)", out.len() - start);
        out.len() > start
    }

    fn triangle_buffers(&self) -> &[Arc<TriangleBuffer>] {
        &self.buffers
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::KdTree
    }

    fn generate_spatial_data(&mut self) {
        self.build_tree();
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        self.write_tree(out);
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<usize, ColliderError> {
        self.read_tree(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::linear::LinearTriangleCollector;
    use crate::spatial::tests::test_utils::{grid, hit_keys, small_leaf_config, unit_cube};
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_distance() {
        let tree = KdTreeCollider::build(vec![unit_cube()], small_leaf_config());
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::z());

        let hit = tree.closest_triangle(&ray, &TransformState::identity()).unwrap();
        assert_relative_eq!(hit.distance, 4.5, epsilon = 1e-5);
        assert!(hit.triangle_index < 2, "expected a -Z face triangle, got {}", hit.triangle_index);
        assert!(tree.check_collision(&ray, &TransformState::identity()));
    }

    #[test]
    fn test_default_config_small_mesh_is_single_leaf() {
        let tree = KdTreeCollider::build(vec![unit_cube()], ColliderConfig::default());
        let stats = tree.stats();
        assert_eq!(stats.node_count, 1);
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(tree.root().unwrap().triangle_indices().len(), 12);
    }

    #[test]
    fn test_structure_invariants() {
        let tree = KdTreeCollider::build(vec![grid(12)], small_leaf_config());
        assert!(tree.nodes().len() > 1);

        let mut stack = vec![(0u32, 0usize, tree.bounds())];
        let mut referenced = vec![false; tree.triangle_pool().len()];
        while let Some((index, depth, cell)) = stack.pop() {
            let node = &tree.nodes()[index as usize];
            let axis = node.axis() as usize;
            assert_eq!(axis, depth % 3);
            assert_relative_eq!(node.split_position(), (cell.min[axis] + cell.max[axis]) * 0.5);

            if node.is_leaf() {
                for &i in node.triangle_indices() {
                    referenced[i as usize] = true;
                }
            } else {
                assert!(node.triangle_indices().is_empty());
            }

            if let Some(left) = node.left() {
                assert!(left > index, "children follow their parent in pre-order");
                let mut child = cell;
                child.max[axis] = node.split_position();
                stack.push((left, depth + 1, child));
            }
            if let Some(right) = node.right() {
                assert!(right > index);
                let mut child = cell;
                child.min[axis] = node.split_position();
                stack.push((right, depth + 1, child));
            }
        }

        assert!(referenced.iter().all(|&r| r), "every triangle reaches a leaf");
    }

    #[test]
    fn test_pool_matches_buffers() {
        let tree = KdTreeCollider::build(vec![unit_cube(), grid(2)], small_leaf_config());
        let pool = tree.triangle_pool();
        assert_eq!(pool.len(), 12 + 8);
        assert_eq!(pool[11], TriangleData { buffer_index: 0, triangle_index: 11 });
        assert_eq!(pool[12], TriangleData { buffer_index: 1, triangle_index: 0 });
    }

    #[test]
    fn test_identical_triangles_terminate() {
        // Stacked copies cannot be separated by any split
        let vertices = vec![Vec3::zeros(), Vec3::x(), Vec3::y()];
        let indices = [0u32, 1, 2].repeat(64);
        let buffer = Arc::new(TriangleBuffer::new(vertices, indices).unwrap());

        let tree = KdTreeCollider::build(vec![buffer], small_leaf_config());
        let stats = tree.stats();
        assert!(stats.max_depth < 16);
        assert_eq!(stats.max_leaf_triangles, 64);
    }

    #[test]
    fn test_ray_in_split_plane_sees_both_sides() {
        let buffers = vec![grid(8)];
        let tree = KdTreeCollider::build(buffers.clone(), small_leaf_config());
        let linear = LinearTriangleCollector::new(buffers, tree.config().face_culling);
        let root = tree.root().unwrap();
        assert_eq!(root.axis(), 0);
        let split = root.split_position();

        // Vertical ray exactly on the root's x split, pointing down at the grid
        let ray = Ray::new(Vec3::new(split, 0.3, 5.0), -Vec3::z());
        let mut from_tree = Vec::new();
        let mut from_linear = Vec::new();
        tree.intersecting_triangles(&ray, &TransformState::identity(), &mut from_tree);
        linear.intersecting_triangles(&ray, &TransformState::identity(), &mut from_linear);

        assert_eq!(hit_keys(&from_tree), hit_keys(&from_linear));
    }

    #[test]
    fn test_empty_and_unbuilt() {
        let empty = Arc::new(TriangleBuffer::new(Vec::new(), Vec::new()).unwrap());
        let tree = KdTreeCollider::build(vec![empty], ColliderConfig::default());
        assert!(tree.root().is_none());
        assert_eq!(tree.stats(), KdTreeStats::default());

        let unbuilt = KdTreeCollider::new(vec![unit_cube()], ColliderConfig::default());
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::z());
        assert!(unbuilt.closest_triangle(&ray, &TransformState::identity()).is_none());
    }
}
