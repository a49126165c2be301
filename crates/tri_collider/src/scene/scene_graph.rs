//! Scene graph nodes and the view the pick queries walk
//!
//! [`SceneView`] is the read-only surface the pick functions need from a
//! node hierarchy. [`SceneGraph`] is a slotmap-backed hierarchy implementing
//! it, with world transforms and bounds refreshed by
//! [`SceneGraph::update_world_state`].

use std::fmt::Debug;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::collision::AABB;
use crate::foundation::math::TransformState;
use crate::spatial::TriangleCollider;

slotmap::new_key_type! {
    /// Handle to a node in a [`SceneGraph`]
    pub struct NodeKey;
}

bitflags::bitflags! {
    /// Node categories, combined into masks for pick queries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeType: u32 {
        /// Camera
        const CAMERA = 1;
        /// Light source
        const LIGHT = 2;
        /// Particle emitter
        const PARTICLE_EMITTER = 4;
        /// Renderable entity
        const ENTITY = 8;
        /// Grouping node without content
        const DUMMY = 16;
        /// Decal
        const DECAL = 32;
        /// Skeleton bone
        const BONE = 64;
        /// Every category
        const ALL = Self::CAMERA.bits()
            | Self::LIGHT.bits()
            | Self::PARTICLE_EMITTER.bits()
            | Self::ENTITY.bits()
            | Self::DUMMY.bits()
            | Self::DECAL.bits()
            | Self::BONE.bits();
    }
}

/// Read access to a node hierarchy
pub trait SceneView {
    /// Node handle
    type Node: Copy + Eq + Debug;

    /// World-space bounds of the node alone
    fn world_bounds(&self, node: Self::Node) -> AABB;

    /// World-space bounds of the node and every descendant
    fn total_bounds(&self, node: Self::Node) -> AABB;

    /// Direct children
    fn children(&self, node: Self::Node) -> &[Self::Node];

    /// Category of the node
    fn node_type(&self, node: Self::Node) -> NodeType;

    /// World placement of the node
    fn world_transform(&self, node: Self::Node) -> TransformState;

    /// Triangle collider attached to the node, if any
    fn triangle_collider(&self, node: Self::Node) -> Option<&dyn TriangleCollider>;
}

/// Scene graph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The key does not name a live node
    #[error("scene node {0:?} not found")]
    NodeNotFound(NodeKey),

    /// The root cannot be removed
    #[error("the root node cannot be removed")]
    RootRemoval,
}

/// A node in the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    name: String,
    node_type: NodeType,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    local_transform: TransformState,
    world_transform: TransformState,
    local_bounds: AABB,
    world_bounds: AABB,
    total_bounds: AABB,
    collider: Option<Arc<dyn TriangleCollider>>,
}

impl SceneNode {
    fn new(name: String, node_type: NodeType, parent: Option<NodeKey>, local_transform: TransformState, local_bounds: AABB) -> Self {
        Self {
            name,
            node_type,
            parent,
            children: Vec::new(),
            local_transform,
            world_transform: local_transform,
            local_bounds,
            world_bounds: AABB::empty(),
            total_bounds: AABB::empty(),
            collider: None,
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node category
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Parent, absent for the root
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Direct children in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Placement relative to the parent
    pub fn local_transform(&self) -> &TransformState {
        &self.local_transform
    }

    /// Placement in the world, as of the last update
    pub fn world_transform(&self) -> &TransformState {
        &self.world_transform
    }

    /// Bounds in the node's own space
    pub fn local_bounds(&self) -> AABB {
        self.local_bounds
    }

    /// Own bounds in world space, as of the last update
    pub fn world_bounds(&self) -> AABB {
        self.world_bounds
    }

    /// Subtree bounds in world space, as of the last update
    pub fn total_bounds(&self) -> AABB {
        self.total_bounds
    }

    /// Attached triangle collider
    pub fn collider(&self) -> Option<&Arc<dyn TriangleCollider>> {
        self.collider.as_ref()
    }
}

/// Slotmap-backed scene hierarchy with a single root
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    root: NodeKey,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph holding only an empty root node
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(
            "root".to_string(),
            NodeType::DUMMY,
            None,
            TransformState::identity(),
            AABB::empty(),
        ));
        Self { nodes, root }
    }

    /// The root node
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Look up a node
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))
    }

    /// Add a child of `parent`.
    ///
    /// World state is stale until the next [`update_world_state`](Self::update_world_state).
    pub fn add_node(
        &mut self,
        parent: NodeKey,
        name: impl Into<String>,
        node_type: NodeType,
        local_transform: TransformState,
        local_bounds: AABB,
    ) -> Result<NodeKey, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }

        let key = self.nodes.insert(SceneNode::new(
            name.into(),
            node_type,
            Some(parent),
            local_transform,
            local_bounds,
        ));
        self.node_mut(parent)?.children.push(key);
        Ok(key)
    }

    /// Remove a node and its whole subtree
    pub fn remove_node(&mut self, key: NodeKey) -> Result<(), SceneError> {
        if key == self.root {
            return Err(SceneError::RootRemoval);
        }
        let parent = self.node_mut(key)?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|&child| child != key);
        }

        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children);
            }
        }
        Ok(())
    }

    /// Attach or clear a node's triangle collider.
    ///
    /// The collider's buffer bounds are merged into the node's local bounds.
    pub fn set_collider(&mut self, key: NodeKey, collider: Option<Arc<dyn TriangleCollider>>) -> Result<(), SceneError> {
        let node = self.node_mut(key)?;
        if let Some(collider) = &collider {
            for buffer in collider.triangle_buffers() {
                node.local_bounds.merge(&buffer.bounds());
            }
        }
        node.collider = collider;
        Ok(())
    }

    /// Replace a node's placement relative to its parent
    pub fn set_local_transform(&mut self, key: NodeKey, transform: TransformState) -> Result<(), SceneError> {
        self.node_mut(key)?.local_transform = transform;
        Ok(())
    }

    /// Replace a node's local bounds
    pub fn set_local_bounds(&mut self, key: NodeKey, bounds: AABB) -> Result<(), SceneError> {
        self.node_mut(key)?.local_bounds = bounds;
        Ok(())
    }

    /// Recompute world transforms, world bounds and subtree bounds from the root down
    pub fn update_world_state(&mut self) {
        self.update_subtree(self.root, TransformState::identity());
    }

    fn update_subtree(&mut self, key: NodeKey, parent_world: TransformState) -> AABB {
        let Some(node) = self.nodes.get_mut(key) else {
            return AABB::empty();
        };
        node.world_transform = parent_world.combine(&node.local_transform);
        node.world_bounds = node.local_bounds.transformed(&node.world_transform);

        let world = node.world_transform;
        let mut total = node.world_bounds;
        let children = node.children.clone();

        for child in children {
            total.merge(&self.update_subtree(child, world));
        }

        if let Some(node) = self.nodes.get_mut(key) {
            node.total_bounds = total;
        }
        total
    }
}

impl SceneView for SceneGraph {
    type Node = NodeKey;

    fn world_bounds(&self, node: NodeKey) -> AABB {
        self.nodes.get(node).map_or_else(AABB::empty, |n| n.world_bounds)
    }

    fn total_bounds(&self, node: NodeKey) -> AABB {
        self.nodes.get(node).map_or_else(AABB::empty, |n| n.total_bounds)
    }

    fn children(&self, node: NodeKey) -> &[NodeKey] {
        match self.nodes.get(node) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    fn node_type(&self, node: NodeKey) -> NodeType {
        self.nodes.get(node).map_or(NodeType::empty(), |n| n.node_type)
    }

    fn world_transform(&self, node: NodeKey) -> TransformState {
        self.nodes.get(node).map_or_else(TransformState::identity, |n| n.world_transform)
    }

    fn triangle_collider(&self, node: NodeKey) -> Option<&dyn TriangleCollider> {
        self.nodes.get(node)?.collider.as_deref()
    }
}
