//! Terrain configuration

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::chunk::ChunkLayout;
use crate::terrain::height::HeightFieldParams;

/// Configuration for a terrain chunk store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Chunks along X in the default populated grid
    pub max_chunks_x: u32,
    /// Chunks along Z in the default populated grid
    pub max_chunks_z: u32,
    /// World units per chunk side
    pub chunk_size: f64,
    /// Quads per chunk side
    pub segments: u32,
    /// Height function parameters
    pub height: HeightFieldParams,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            max_chunks_x: 24,
            max_chunks_z: 24,
            chunk_size: 128.0,
            segments: 56,
            height: HeightFieldParams::default(),
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunks_x == 0 || self.max_chunks_z == 0 {
            return Err(Error::config("max_chunks_x and max_chunks_z must be >= 1"));
        }
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(Error::config(format!("chunk_size must be > 0, got {}", self.chunk_size)));
        }
        if self.segments == 0 {
            return Err(Error::config("segments must be >= 1"));
        }
        self.height.validate()
    }

    /// Resident chunk limit of the store
    pub fn capacity(&self) -> usize {
        self.max_chunks_x as usize * self.max_chunks_z as usize
    }

    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            chunk_size: self.chunk_size,
            segments: self.segments,
        }
    }
}
