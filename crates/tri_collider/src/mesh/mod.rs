//! Indexed triangle storage shared by the colliders

pub mod triangle_buffer;

pub use triangle_buffer::{TriangleBuffer, TriangleBufferError, TriangleSkinningRecord};
