//! Procedural terrain: fractal height field, chunk store and surface sampling

pub mod height;
pub mod chunk;
pub mod cache;
pub mod config;
pub mod store;
pub mod sampler;

pub use height::{HeightField, HeightFieldParams};
pub use chunk::{ChunkCoord, ChunkLayout, TerrainChunk, TerrainVertex};
pub use cache::ChunkCache;
pub use config::TerrainConfig;
pub use store::TerrainChunkStore;
pub use sampler::{InstanceTransform, PlacementPolicy, SamplerConfig, SurfaceSampler, scatter_instances};
