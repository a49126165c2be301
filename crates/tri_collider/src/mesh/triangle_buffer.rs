//! Indexed triangle buffer
//!
//! A buffer holds unique vertex positions and an index list with three
//! entries per triangle. Normals (with their own index list) and per-triangle
//! skinning records are optional. Construction validates every index, so the
//! accessors can index without further checks.

use std::collections::HashMap;

use crate::collision::{Triangle, AABB};
use crate::foundation::math::{Vec3, Vec4};

/// Errors raised while assembling a triangle buffer
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TriangleBufferError {
    /// Index list length is not a multiple of three
    #[error("index list of length {len} does not describe whole triangles")]
    NotTriangles {
        /// Offending length
        len: usize,
    },

    /// An index points past the end of its vertex list
    #[error("index {index} out of range for {count} entries")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Length of the list it indexes
        count: usize,
    },

    /// A parallel list does not line up with the triangles
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Which list
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },
}

/// Bone influences for the three corners of one triangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriangleSkinningRecord {
    /// Bone indices per corner
    pub bone_indices: [Vec4; 3],
    /// Bone weights per corner
    pub bone_weights: [Vec4; 3],
}

/// Immutable indexed triangle soup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleBuffer {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    normals: Vec<Vec3>,
    normal_indices: Vec<u32>,
    skinning: Vec<TriangleSkinningRecord>,
}

fn check_indices(indices: &[u32], count: usize) -> Result<(), TriangleBufferError> {
    if indices.len() % 3 != 0 {
        return Err(TriangleBufferError::NotTriangles { len: indices.len() });
    }
    match indices.iter().find(|&&index| index as usize >= count) {
        Some(&index) => Err(TriangleBufferError::IndexOutOfRange { index, count }),
        None => Ok(()),
    }
}

impl TriangleBuffer {
    /// Create a buffer from unique positions and triangle indices
    pub fn new(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, TriangleBufferError> {
        check_indices(&indices, vertices.len())?;
        Ok(Self {
            vertices,
            indices,
            ..Default::default()
        })
    }

    /// Create a buffer from a soup that may repeat positions.
    ///
    /// Positions with identical bit patterns are merged into one vertex and
    /// unreferenced positions are dropped.
    pub fn from_triangle_soup(positions: &[Vec3], indices: &[u32]) -> Result<Self, TriangleBufferError> {
        check_indices(indices, positions.len())?;

        let mut welded: HashMap<[u32; 3], u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut remapped = Vec::with_capacity(indices.len());

        for &index in indices {
            let position = positions[index as usize];
            let key = [position.x.to_bits(), position.y.to_bits(), position.z.to_bits()];
            let unique = *welded.entry(key).or_insert_with(|| {
                vertices.push(position);
                (vertices.len() - 1) as u32
            });
            remapped.push(unique);
        }

        Ok(Self {
            vertices,
            indices: remapped,
            ..Default::default()
        })
    }

    /// Attach normals indexed per triangle corner
    pub fn with_normals(mut self, normals: Vec<Vec3>, normal_indices: Vec<u32>) -> Result<Self, TriangleBufferError> {
        if normal_indices.len() != self.indices.len() {
            return Err(TriangleBufferError::LengthMismatch {
                what: "normal index list",
                expected: self.indices.len(),
                actual: normal_indices.len(),
            });
        }
        check_indices(&normal_indices, normals.len())?;

        self.normals = normals;
        self.normal_indices = normal_indices;
        Ok(self)
    }

    /// Attach one skinning record per triangle
    pub fn with_skinning(mut self, records: Vec<TriangleSkinningRecord>) -> Result<Self, TriangleBufferError> {
        if records.len() != self.triangle_count() {
            return Err(TriangleBufferError::LengthMismatch {
                what: "skinning record list",
                expected: self.triangle_count(),
                actual: records.len(),
            });
        }

        self.skinning = records;
        Ok(self)
    }

    /// Unique vertex positions
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Vertex indices, three per triangle
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Normal list, empty when none were attached
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Normal indices, parallel to [`indices`](Self::indices) when present
    pub fn normal_indices(&self) -> &[u32] {
        &self.normal_indices
    }

    /// Per-triangle skinning records, empty when the mesh is not skinned
    pub fn skinning(&self) -> &[TriangleSkinningRecord] {
        &self.skinning
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex index of one triangle corner
    ///
    /// # Panics
    ///
    /// Panics if `triangle` is not below [`triangle_count`](Self::triangle_count)
    /// or `corner` is not below 3.
    pub fn index(&self, triangle: usize, corner: usize) -> u32 {
        assert!(corner < 3, "triangle corner {corner} out of range");
        self.indices[triangle * 3 + corner]
    }

    /// Position of one triangle corner
    ///
    /// # Panics
    ///
    /// Same conditions as [`index`](Self::index).
    pub fn point(&self, triangle: usize, corner: usize) -> Vec3 {
        self.vertices[self.index(triangle, corner) as usize]
    }

    /// Position of one triangle corner, or `None` when out of range
    pub fn try_point(&self, triangle: usize, corner: usize) -> Option<Vec3> {
        if corner >= 3 {
            return None;
        }
        let index = *self.indices.get(triangle * 3 + corner)?;
        self.vertices.get(index as usize).copied()
    }

    /// Normal of one triangle corner, if normals are attached
    pub fn normal(&self, triangle: usize, corner: usize) -> Option<Vec3> {
        if corner >= 3 {
            return None;
        }
        let index = *self.normal_indices.get(triangle * 3 + corner)?;
        self.normals.get(index as usize).copied()
    }

    /// The three corners of a triangle
    pub fn triangle(&self, triangle: usize) -> Triangle {
        Triangle::new(
            self.point(triangle, 0),
            self.point(triangle, 1),
            self.point(triangle, 2),
        )
    }

    /// Bounds of every vertex, empty for an empty buffer
    pub fn bounds(&self) -> AABB {
        AABB::from_points(self.vertices.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleBuffer {
        TriangleBuffer::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_indices() {
        let vertices = vec![Vec3::zeros(), Vec3::x(), Vec3::y()];

        let partial = TriangleBuffer::new(vertices.clone(), vec![0, 1]);
        assert_eq!(partial, Err(TriangleBufferError::NotTriangles { len: 2 }));

        let out_of_range = TriangleBuffer::new(vertices, vec![0, 1, 3]);
        assert_eq!(out_of_range, Err(TriangleBufferError::IndexOutOfRange { index: 3, count: 3 }));
    }

    #[test]
    fn test_accessors() {
        let buffer = quad();
        assert_eq!(buffer.triangle_count(), 2);
        assert_eq!(buffer.index(1, 2), 3);
        assert_eq!(buffer.point(1, 1), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(buffer.try_point(2, 0), None);
        assert_eq!(buffer.try_point(0, 3), None);
        assert_eq!(buffer.triangle(0).c, Vec3::new(1.0, 1.0, 0.0));

        let bounds = buffer.bounds();
        assert_eq!(bounds.min, Vec3::zeros());
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_soup_welds_identical_positions() {
        let soup = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let buffer = TriangleBuffer::from_triangle_soup(&soup, &[0, 1, 2, 3, 4, 5]).unwrap();

        assert_eq!(buffer.vertices().len(), 4);
        assert_eq!(buffer.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(buffer.triangle(1), quad().triangle(1));
    }

    #[test]
    fn test_normals_and_skinning() {
        let buffer = quad()
            .with_normals(vec![Vec3::z()], vec![0; 6])
            .unwrap()
            .with_skinning(vec![TriangleSkinningRecord::default(); 2])
            .unwrap();

        assert_eq!(buffer.normal(1, 2), Some(Vec3::z()));
        assert_eq!(buffer.skinning().len(), 2);

        let short = quad().with_normals(vec![Vec3::z()], vec![0; 3]);
        assert!(matches!(short, Err(TriangleBufferError::LengthMismatch { expected: 6, actual: 3, .. })));

        let wrong = quad().with_skinning(vec![TriangleSkinningRecord::default()]);
        assert!(wrong.is_err());
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = TriangleBuffer::new(Vec::new(), Vec::new()).unwrap();
        assert_eq!(buffer.triangle_count(), 0);
        assert!(buffer.bounds().is_empty());
        assert_eq!(buffer.normal(0, 0), None);
    }
}
