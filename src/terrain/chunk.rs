//! Heightfield chunk meshes

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::math::Aabb;
use crate::terrain::height::HeightField;

/// Integer coordinate identifying a chunk in the terrain grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the world position
    pub fn from_world(x: f64, z: f64, chunk_size: f64) -> Self {
        Self {
            x: (x / chunk_size).floor() as i32,
            z: (z / chunk_size).floor() as i32,
        }
    }
}

/// Mesh dimensions shared by every chunk of a store
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkLayout {
    /// World units per chunk side
    pub chunk_size: f64,
    /// Quads per chunk side
    pub segments: u32,
}

impl ChunkLayout {
    /// World coordinate of a grid line.
    ///
    /// Computed from the global vertex index so that the last vertex of chunk
    /// `c` and the first vertex of chunk `c + 1` are bit-identical.
    pub fn vertex_coord(&self, chunk: i32, local: u32) -> f64 {
        let global = chunk as i64 * self.segments as i64 + local as i64;
        global as f64 * self.chunk_size / self.segments as f64
    }

    /// Spacing between adjacent vertices
    pub fn cell_size(&self) -> f64 {
        self.chunk_size / self.segments as f64
    }

    pub fn vertices_per_side(&self) -> u32 {
        self.segments + 1
    }
}

/// Vertex layout uploaded to the host renderer
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// A generated heightfield patch. Immutable once built.
#[derive(Debug)]
pub struct TerrainChunk {
    coord: ChunkCoord,
    layout: ChunkLayout,
    /// Row-major `(segments + 1)²` heights as sampled, z rows then x columns
    heights: Vec<f64>,
    vertices: Vec<TerrainVertex>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl TerrainChunk {
    /// Sample the height field over the chunk grid and build its mesh.
    pub fn generate(coord: ChunkCoord, layout: ChunkLayout, field: &HeightField) -> Self {
        let side = layout.vertices_per_side();
        let eps = layout.cell_size();
        let mut heights = Vec::with_capacity((side * side) as usize);
        let mut vertices = Vec::with_capacity((side * side) as usize);
        let mut min_h = f64::INFINITY;
        let mut max_h = f64::NEG_INFINITY;

        for j in 0..side {
            let z = layout.vertex_coord(coord.z, j);
            for i in 0..side {
                let x = layout.vertex_coord(coord.x, i);
                let h = field.height(x, z);
                min_h = min_h.min(h);
                max_h = max_h.max(h);
                heights.push(h);
                vertices.push(TerrainVertex {
                    position: [x as f32, h as f32, z as f32],
                    normal: field.normal_at(x, z, eps).to_array(),
                    uv: [i as f32 / layout.segments as f32, j as f32 / layout.segments as f32],
                });
            }
        }

        let indices = grid_indices(layout.segments);
        let x0 = layout.vertex_coord(coord.x, 0) as f32;
        let z0 = layout.vertex_coord(coord.z, 0) as f32;
        let x1 = layout.vertex_coord(coord.x, layout.segments) as f32;
        let z1 = layout.vertex_coord(coord.z, layout.segments) as f32;
        let bounds = Aabb::new(
            Vec3::new(x0, min_h as f32, z0),
            Vec3::new(x1, max_h as f32, z1),
        );

        Self { coord, layout, heights, vertices, indices, bounds }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// World-space bounds; XZ is the exact chunk footprint
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Height sampled at local grid vertex (i, j)
    pub fn vertex_height(&self, i: u32, j: u32) -> f64 {
        let side = self.layout.vertices_per_side();
        self.heights[(j * side + i) as usize]
    }

    /// World (x, z) of local grid vertex (i, j)
    pub fn vertex_xz(&self, i: u32, j: u32) -> (f64, f64) {
        (
            self.layout.vertex_coord(self.coord.x, i),
            self.layout.vertex_coord(self.coord.z, j),
        )
    }

    /// Footprint as `(min_x, min_z, max_x, max_z)` in world units
    pub fn footprint(&self) -> (f64, f64, f64, f64) {
        let (x0, z0) = self.vertex_xz(0, 0);
        let (x1, z1) = self.vertex_xz(self.layout.segments, self.layout.segments);
        (x0, z0, x1, z1)
    }
}

/// Two counter-clockwise (seen from +Y) triangles per grid quad.
fn grid_indices(segments: u32) -> Vec<u32> {
    let side = segments + 1;
    let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
    for j in 0..segments {
        for i in 0..segments {
            let a = j * side + i;
            let b = a + 1;
            let c = a + side;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    indices
}
