use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use point_cloud_loader::Chunk;

/// Quad corners in point-size units, expanded in the vertex shader.
const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Marks an entity holding one streamed chunk of the point cloud.
#[derive(Component, Debug, Clone, Copy)]
pub struct PointChunk {
    pub index: usize,
    pub first_point: u64,
    pub count: usize,
}

/// Build a quad-per-point mesh from a decoded chunk.
///
/// Every point contributes four vertices sharing its position and color, so
/// `vertex_index / 4` recovers the point's index within the chunk.
pub fn create_point_chunk_mesh(chunk: &Chunk) -> Mesh {
    let mut positions = Vec::with_capacity(chunk.count * 4);
    let mut corners = Vec::with_capacity(chunk.count * 4);
    let mut colors = Vec::with_capacity(chunk.count * 4);
    let mut indices = Vec::with_capacity(chunk.count * 6);

    for point in 0..chunk.count {
        let position = chunk.position(point);
        let [r, g, b] = chunk.color(point);
        let color = [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            1.0,
        ];
        let base = (point * 4) as u32;
        for corner in CORNERS {
            positions.push(position);
            corners.push(corner);
            colors.push(color);
        }
        indices.extend(QUAD_INDICES.iter().map(|offset| base + offset));
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, corners);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
