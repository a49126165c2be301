//! KD-tree binary format
//!
//! All values are native-endian 32-bit words:
//!
//! ```text
//! u32 has_root
//! node (pre-order, only when has_root == 1):
//!     u32 axis, f32 split_position, u32 triangle_count,
//!     u32 triangle_indices[triangle_count],
//!     u32 has_left, u32 has_right,
//!     left subtree, right subtree
//! u32 pool_count
//! pool_count x (u32 buffer_index, u32 triangle_index)
//! ```
//!
//! Reading validates everything against the collider's buffers and leaves
//! the collider untouched on failure.

use std::mem::size_of;

use bytemuck::Pod;

use super::collider::ColliderError;
use super::kdtree::{KdNode, KdTreeCollider, TriangleData, MAX_TREE_DEPTH};

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ColliderError> {
        let remaining = self.bytes.len() - self.offset;
        if len > remaining {
            return Err(ColliderError::Truncated {
                offset: self.offset,
                needed: len - remaining,
            });
        }
        let chunk = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(chunk)
    }

    fn read<T: Pod>(&mut self) -> Result<T, ColliderError> {
        self.take(size_of::<T>()).map(bytemuck::pod_read_unaligned)
    }

    fn read_array<T: Pod>(&mut self, count: u32) -> Result<Vec<T>, ColliderError> {
        let len = (count as usize)
            .checked_mul(size_of::<T>())
            .ok_or(ColliderError::Truncated {
                offset: self.offset,
                needed: usize::MAX,
            })?;
        let chunk = self.take(len)?;
        Ok(chunk.chunks_exact(size_of::<T>()).map(bytemuck::pod_read_unaligned).collect())
    }

    fn read_flag(&mut self) -> Result<bool, ColliderError> {
        match self.read::<u32>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ColliderError::InvalidFlag(other)),
        }
    }
}

fn write<T: Pod>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(bytemuck::bytes_of(&value));
}

fn read_node(reader: &mut ByteReader<'_>, nodes: &mut Vec<KdNode>, depth: usize) -> Result<u32, ColliderError> {
    if depth >= MAX_TREE_DEPTH {
        return Err(ColliderError::TooDeep(MAX_TREE_DEPTH));
    }

    let axis: u32 = reader.read()?;
    if axis > 2 {
        return Err(ColliderError::InvalidAxis(axis));
    }
    let split_position: f32 = reader.read()?;
    let triangle_count: u32 = reader.read()?;
    let triangle_indices = reader.read_array::<u32>(triangle_count)?;
    let has_left = reader.read_flag()?;
    let has_right = reader.read_flag()?;

    let index = nodes.len();
    let mut node = KdNode::new(axis, split_position);
    node.triangle_indices = triangle_indices;
    nodes.push(node);

    if has_left {
        let child = read_node(reader, nodes, depth + 1)?;
        nodes[index].children[0] = Some(child);
    }
    if has_right {
        let child = read_node(reader, nodes, depth + 1)?;
        nodes[index].children[1] = Some(child);
    }

    Ok(index as u32)
}

impl KdTreeCollider {
    pub(crate) fn write_tree(&self, out: &mut Vec<u8>) {
        write(out, u32::from(!self.nodes.is_empty()));
        if !self.nodes.is_empty() {
            self.write_node(0, out);
        }

        write(out, self.pool.len() as u32);
        out.extend_from_slice(bytemuck::cast_slice(&self.pool));
    }

    fn write_node(&self, index: u32, out: &mut Vec<u8>) {
        let node = &self.nodes[index as usize];
        write(out, node.axis);
        write(out, node.split_position);
        write(out, node.triangle_indices.len() as u32);
        out.extend_from_slice(bytemuck::cast_slice(&node.triangle_indices));
        write(out, u32::from(node.children[0].is_some()));
        write(out, u32::from(node.children[1].is_some()));

        for child in node.children.iter().flatten() {
            self.write_node(*child, out);
        }
    }

    pub(crate) fn read_tree(&mut self, bytes: &[u8]) -> Result<usize, ColliderError> {
        match self.parse_tree(bytes) {
            Ok((nodes, pool, consumed)) => {
                self.nodes = nodes;
                self.pool = pool;
                self.bounds = Self::compute_bounds(&self.buffers);
                log::debug!("Loaded KD-tree: {} nodes, {} pool entries, {} bytes", self.nodes.len(), self.pool.len(), consumed);
                Ok(consumed)
            }
            Err(err) => {
                log::warn!("Rejected serialized KD-tree: {}", err);
                Err(err)
            }
        }
    }

    fn parse_tree(&self, bytes: &[u8]) -> Result<(Vec<KdNode>, Vec<TriangleData>, usize), ColliderError> {
        let mut reader = ByteReader::new(bytes);
        let mut nodes = Vec::new();

        if reader.read_flag()? {
            read_node(&mut reader, &mut nodes, 0)?;
        }

        let pool_count: u32 = reader.read()?;
        let pool = reader.read_array::<TriangleData>(pool_count)?;

        for entry in &pool {
            let exists = self
                .buffers
                .get(entry.buffer_index as usize)
                .is_some_and(|buffer| (entry.triangle_index as usize) < buffer.triangle_count());
            if !exists {
                return Err(ColliderError::MissingTriangle {
                    buffer_index: entry.buffer_index,
                    triangle_index: entry.triangle_index,
                });
            }
        }

        for node in &nodes {
            if let Some(&index) = node.triangle_indices.iter().find(|&&i| i as usize >= pool.len()) {
                return Err(ColliderError::PoolIndexOutOfRange {
                    index,
                    pool_len: pool.len(),
                });
            }
        }

        Ok((nodes, pool, reader.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColliderConfig;
    use crate::spatial::collider::TriangleCollider;
    use crate::spatial::tests::test_utils::{grid, small_leaf_config, unit_cube, uv_sphere};

    fn push(bytes: &mut Vec<u8>, value: u32) {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }

    fn single_leaf(index: u32, entry: (u32, u32)) -> Vec<u8> {
        let mut bytes = Vec::new();
        push(&mut bytes, 1);
        push(&mut bytes, 0);
        bytes.extend_from_slice(&0.0f32.to_ne_bytes());
        push(&mut bytes, 1);
        push(&mut bytes, index);
        push(&mut bytes, 0);
        push(&mut bytes, 0);
        push(&mut bytes, 1);
        push(&mut bytes, entry.0);
        push(&mut bytes, entry.1);
        bytes
    }

    #[test]
    fn test_round_trip_reproduces_tree() {
        let buffers = vec![uv_sphere(8, 12, 1.0), grid(4)];
        let tree = KdTreeCollider::build(buffers.clone(), small_leaf_config());

        let mut bytes = Vec::new();
        tree.serialize(&mut bytes);

        let mut loaded = KdTreeCollider::new(buffers, small_leaf_config());
        let consumed = loaded.deserialize(&bytes).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(loaded.nodes(), tree.nodes());
        assert_eq!(loaded.triangle_pool(), tree.triangle_pool());
        assert_eq!(loaded.bounds(), tree.bounds());
        assert_eq!(loaded.stats(), tree.stats());
    }

    #[test]
    fn test_consumed_count_ignores_trailing_bytes() {
        let tree = KdTreeCollider::build(vec![unit_cube()], ColliderConfig::default());
        let mut bytes = Vec::new();
        tree.serialize(&mut bytes);
        let len = bytes.len();
        bytes.extend_from_slice(&[0xAB; 16]);

        let mut loaded = KdTreeCollider::new(vec![unit_cube()], ColliderConfig::default());
        assert_eq!(loaded.deserialize(&bytes).unwrap(), len);
    }

    #[test]
    fn test_single_leaf_layout() {
        let tree = KdTreeCollider::build(vec![unit_cube()], ColliderConfig::default());
        let mut bytes = Vec::new();
        tree.serialize(&mut bytes);

        // has_root + 3 node words + 12 indices + 2 flags + pool count + 12 pairs
        assert_eq!(bytes.len(), 4 * (1 + 3 + 12 + 2 + 1 + 24));
        assert_eq!(&bytes[..4], &1u32.to_ne_bytes());
    }

    #[test]
    fn test_empty_tree() {
        let empty = std::sync::Arc::new(crate::mesh::TriangleBuffer::default());
        let tree = KdTreeCollider::build(vec![empty.clone()], ColliderConfig::default());
        let mut bytes = Vec::new();
        tree.serialize(&mut bytes);
        assert_eq!(bytes, [0u8; 8]);

        let mut loaded = KdTreeCollider::new(vec![empty], ColliderConfig::default());
        assert_eq!(loaded.deserialize(&bytes).unwrap(), 8);
        assert!(loaded.root().is_none());
    }

    #[test]
    fn test_every_prefix_is_truncated() {
        let tree = KdTreeCollider::build(vec![grid(3)], small_leaf_config());
        let mut bytes = Vec::new();
        tree.serialize(&mut bytes);

        for len in 0..bytes.len() {
            let mut loaded = KdTreeCollider::new(vec![grid(3)], small_leaf_config());
            let result = loaded.deserialize(&bytes[..len]);
            assert!(matches!(result, Err(ColliderError::Truncated { .. })), "prefix {len}");
        }
    }

    #[test]
    fn test_rejects_bad_axis_and_flag() {
        let mut loaded = KdTreeCollider::new(vec![unit_cube()], ColliderConfig::default());

        let mut bad_axis = Vec::new();
        push(&mut bad_axis, 1);
        push(&mut bad_axis, 3);
        assert!(matches!(loaded.deserialize(&bad_axis), Err(ColliderError::InvalidAxis(3))));

        let mut bad_flag = Vec::new();
        push(&mut bad_flag, 2);
        assert!(matches!(loaded.deserialize(&bad_flag), Err(ColliderError::InvalidFlag(2))));
    }

    #[test]
    fn test_rejects_dangling_references() {
        let mut loaded = KdTreeCollider::new(vec![unit_cube()], ColliderConfig::default());

        assert!(loaded.deserialize(&single_leaf(0, (0, 11))).is_ok());

        assert!(matches!(
            loaded.deserialize(&single_leaf(5, (0, 0))),
            Err(ColliderError::PoolIndexOutOfRange { index: 5, pool_len: 1 })
        ));
        assert!(matches!(
            loaded.deserialize(&single_leaf(0, (0, 12))),
            Err(ColliderError::MissingTriangle { buffer_index: 0, triangle_index: 12 })
        ));
        assert!(matches!(
            loaded.deserialize(&single_leaf(0, (1, 0))),
            Err(ColliderError::MissingTriangle { buffer_index: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let mut bytes = Vec::new();
        push(&mut bytes, 1);
        for depth in 0..(MAX_TREE_DEPTH as u32 + 8) {
            push(&mut bytes, depth % 3);
            bytes.extend_from_slice(&0.0f32.to_ne_bytes());
            push(&mut bytes, 0);
            push(&mut bytes, 1);
            push(&mut bytes, 0);
        }

        let mut loaded = KdTreeCollider::new(vec![unit_cube()], ColliderConfig::default());
        assert!(matches!(loaded.deserialize(&bytes), Err(ColliderError::TooDeep(_))));
    }

    #[test]
    fn test_failed_load_keeps_existing_tree() {
        let mut tree = KdTreeCollider::build(vec![grid(4)], small_leaf_config());
        let before = tree.nodes().to_vec();

        let mut bytes = Vec::new();
        push(&mut bytes, 1);
        push(&mut bytes, 7);
        assert!(tree.deserialize(&bytes).is_err());
        assert_eq!(tree.nodes(), before.as_slice());
        assert!(!tree.triangle_pool().is_empty());
    }
}
