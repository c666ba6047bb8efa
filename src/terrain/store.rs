//! Terrain chunk store: lazily generated, LRU-bounded heightfield chunks

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::terrain::cache::ChunkCache;
use crate::terrain::chunk::{ChunkCoord, ChunkLayout, TerrainChunk};
use crate::terrain::config::TerrainConfig;
use crate::terrain::height::HeightField;

/// Owns the height field and every resident chunk generated from it.
///
/// Chunk coordinates are not bounded; only the number of resident chunks is
/// (`max_chunks_x * max_chunks_z`, least recently used evicted first).
pub struct TerrainChunkStore {
    config: TerrainConfig,
    field: HeightField,
    cache: ChunkCache,
}

impl TerrainChunkStore {
    pub fn new(config: TerrainConfig) -> Result<Self> {
        config.validate()?;
        let field = HeightField::new(config.height)?;
        let cache = ChunkCache::new(config.capacity());
        Ok(Self { config, field, cache })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn height_field(&self) -> &HeightField {
        &self.field
    }

    pub fn layout(&self) -> ChunkLayout {
        self.config.layout()
    }

    /// Return chunk (cx, cz), generating and registering it on first request.
    ///
    /// Repeated requests return the same `Arc` until the chunk is evicted.
    pub fn add_chunk(&mut self, cx: i32, cz: i32) -> Arc<TerrainChunk> {
        let coord = ChunkCoord::new(cx, cz);
        if let Some(chunk) = self.cache.get(coord) {
            return chunk;
        }

        let chunk = Arc::new(TerrainChunk::generate(coord, self.layout(), &self.field));
        log::debug!("Generated terrain chunk ({}, {}) with {} triangles", cx, cz, chunk.triangle_count());
        if let Some(evicted) = self.cache.insert(chunk.clone()) {
            log::debug!("Evicted terrain chunk ({}, {})", evicted.coord().x, evicted.coord().z);
        }
        chunk
    }

    /// Resident chunk without generating or refreshing it
    pub fn get(&self, cx: i32, cz: i32) -> Option<Arc<TerrainChunk>> {
        self.cache.peek(ChunkCoord::new(cx, cz)).cloned()
    }

    pub fn contains(&self, cx: i32, cz: i32) -> bool {
        self.cache.contains(ChunkCoord::new(cx, cz))
    }

    /// Number of resident chunks
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Resident chunks, least recently used first
    pub fn chunks(&self) -> Vec<Arc<TerrainChunk>> {
        self.cache.iter_lru().cloned().collect()
    }

    /// Union of the resident chunk bounds; `None` while the store is empty.
    pub fn extents(&self) -> Option<Aabb> {
        self.cache
            .iter_lru()
            .map(|chunk| chunk.bounds())
            .reduce(|acc, b| acc.merged(&b))
    }

    /// Elevation at world (x, z); identical to the value chunk meshes use.
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        self.field.height(x, z)
    }

    /// Ensure every chunk of a rectangular coordinate region is resident.
    ///
    /// Chunks of the region that are already resident are marked as used so
    /// registering the missing ones never evicts them. Missing chunks are
    /// generated in parallel, each coordinate exactly once, then registered in
    /// row order. Returns the number of chunks generated, or a configuration
    /// error when the region holds more chunks than the store can keep.
    pub fn ensure_grid(&mut self, xs: Range<i32>, zs: Range<i32>) -> Result<usize> {
        let requested = xs.len() * zs.len();
        if requested > self.capacity() {
            return Err(Error::config(format!(
                "region of {} chunks exceeds store capacity {}",
                requested,
                self.capacity()
            )));
        }

        let mut missing = Vec::new();
        for z in zs {
            for x in xs.clone() {
                let coord = ChunkCoord::new(x, z);
                if self.cache.get(coord).is_none() {
                    missing.push(coord);
                }
            }
        }

        let start = Instant::now();
        let layout = self.layout();
        let field = &self.field;
        let generated: Vec<Arc<TerrainChunk>> = missing
            .par_iter()
            .map(|&coord| Arc::new(TerrainChunk::generate(coord, layout, field)))
            .collect();

        let count = generated.len();
        for chunk in generated {
            if let Some(evicted) = self.cache.insert(chunk) {
                log::debug!("Evicted terrain chunk ({}, {})", evicted.coord().x, evicted.coord().z);
            }
        }

        let elapsed = start.elapsed();
        log::info!(
            "Generated {} terrain chunks in {:.2}s ({} resident)",
            count,
            elapsed.as_secs_f64(),
            self.len()
        );
        Ok(count)
    }

    /// Fill the configured `max_chunks_x × max_chunks_z` grid centred on the origin.
    pub fn populate_centered(&mut self) -> Result<usize> {
        let half_x = (self.config.max_chunks_x / 2) as i32;
        let half_z = (self.config.max_chunks_z / 2) as i32;
        let xs = -half_x..(self.config.max_chunks_x as i32 - half_x);
        let zs = -half_z..(self.config.max_chunks_z as i32 - half_z);
        self.ensure_grid(xs, zs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            max_chunks_x: 2,
            max_chunks_z: 2,
            chunk_size: 64.0,
            segments: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_chunk_returns_cached_instance() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        let a = store.add_chunk(5, 5);
        let b = store.add_chunk(5, 5);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resident_count_stays_bounded() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        for x in 0..10 {
            for z in 0..10 {
                store.add_chunk(x, z);
                assert!(store.len() <= 4);
            }
        }
        assert_eq!(store.len(), 4);
        assert!(store.contains(9, 9));
        assert!(!store.contains(0, 0));
    }

    #[test]
    fn test_recently_used_chunk_survives_eviction() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        let first = store.add_chunk(0, 0);
        store.add_chunk(1, 0);
        store.add_chunk(2, 0);
        store.add_chunk(3, 0);
        assert!(Arc::ptr_eq(&first, &store.add_chunk(0, 0)));
        store.add_chunk(4, 0);
        assert!(store.contains(0, 0));
        assert!(!store.contains(1, 0));
    }

    #[test]
    fn test_neighbouring_chunks_are_seamless() {
        let mut store = TerrainChunkStore::new(TerrainConfig {
            max_chunks_x: 4,
            max_chunks_z: 4,
            chunk_size: 100.0,
            segments: 7,
            ..Default::default()
        }).unwrap();
        let s = 7;
        let c = store.add_chunk(-1, 0);
        let east = store.add_chunk(0, 0);
        let north = store.add_chunk(-1, 1);

        for k in 0..=s {
            assert_eq!(c.vertex_xz(s, k), east.vertex_xz(0, k));
            assert_eq!(c.vertex_height(s, k).to_bits(), east.vertex_height(0, k).to_bits());
            let (x, z) = c.vertex_xz(s, k);
            assert_eq!(c.vertex_height(s, k), store.height_at(x, z));

            assert_eq!(c.vertex_height(k, s).to_bits(), north.vertex_height(k, 0).to_bits());
            let side = s + 1;
            let here = c.vertices()[(s * side + k) as usize].normal;
            let there = north.vertices()[k as usize].normal;
            assert_eq!(here, there);
        }
    }

    #[test]
    fn test_out_of_grid_coordinates_accepted() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        let far = store.add_chunk(10_000, -10_000);
        assert_eq!(far.coord(), ChunkCoord::new(10_000, -10_000));
    }

    #[test]
    fn test_ensure_grid_generates_each_once() {
        let mut store = TerrainChunkStore::new(TerrainConfig {
            max_chunks_x: 3,
            max_chunks_z: 3,
            segments: 4,
            ..Default::default()
        }).unwrap();
        let existing = store.add_chunk(0, 0);
        assert_eq!(store.ensure_grid(-1..2, -1..2).unwrap(), 8);
        assert_eq!(store.len(), 9);
        assert!(Arc::ptr_eq(&existing, &store.get(0, 0).unwrap()));
        assert_eq!(store.ensure_grid(-1..2, -1..2).unwrap(), 0);
    }

    #[test]
    fn test_ensure_grid_keeps_stale_region_chunks() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        let oldest = store.add_chunk(0, 0);
        store.add_chunk(5, 5);
        store.add_chunk(6, 6);
        store.add_chunk(7, 7);

        assert_eq!(store.ensure_grid(0..2, 0..2).unwrap(), 3);
        for (x, z) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert!(store.contains(x, z), "({x}, {z}) not resident");
        }
        assert!(Arc::ptr_eq(&oldest, &store.get(0, 0).unwrap()));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_ensure_grid_rejects_region_larger_than_capacity() {
        let mut store = TerrainChunkStore::new(small_config()).unwrap();
        let result = store.ensure_grid(0..3, 0..2);
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_populate_centered() {
        let mut store = TerrainChunkStore::new(TerrainConfig {
            max_chunks_x: 4,
            max_chunks_z: 2,
            segments: 2,
            ..Default::default()
        }).unwrap();
        assert_eq!(store.populate_centered().unwrap(), 8);
        assert!(store.contains(-2, -1));
        assert!(store.contains(1, 0));
        assert!(!store.contains(2, 0));

        let extents = store.extents().unwrap();
        assert_eq!(extents.min.x, -256.0);
        assert_eq!(extents.max.x, 256.0);
        assert_eq!(extents.min.z, -128.0);
        assert_eq!(extents.max.z, 128.0);
    }

    #[test]
    fn test_empty_store_has_no_extents() {
        let store = TerrainChunkStore::new(small_config()).unwrap();
        assert!(store.extents().is_none());
    }

    #[test]
    fn test_invalid_config() {
        let result = TerrainChunkStore::new(TerrainConfig { chunk_size: -1.0, ..Default::default() });
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
