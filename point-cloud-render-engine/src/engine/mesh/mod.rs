//! Mesh generation for streamed point cloud chunks.
//!
//! Each point becomes an indexed quad that the point material expands to a
//! screen-aligned square in the vertex shader.

/// Quad-per-point chunk meshes and the chunk entity marker.
pub mod point_chunk_mesh;
