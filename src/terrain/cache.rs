//! Least-recently-used bound on resident terrain chunks

use std::collections::HashMap;
use std::sync::Arc;

use crate::terrain::chunk::{ChunkCoord, TerrainChunk};

struct Entry {
    chunk: Arc<TerrainChunk>,
    /// Tick of the last insert or `get`
    last_used: u64,
}

/// Keeps at most `capacity` chunks, evicting the least recently used.
///
/// Chunks are shared as `Arc`, so an evicted chunk stays alive for as long
/// as a caller holds it.
pub struct ChunkCache {
    entries: HashMap<ChunkCoord, Entry>,
    capacity: usize,
    tick: u64,
}

impl ChunkCache {
    /// Capacity is clamped to at least one chunk.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            tick: 0,
        }
    }

    /// Look up a chunk and mark it as most recently used.
    pub fn get(&mut self, coord: ChunkCoord) -> Option<Arc<TerrainChunk>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(&coord)?;
        entry.last_used = tick;
        Some(entry.chunk.clone())
    }

    /// Look up a chunk without refreshing it.
    pub fn peek(&self, coord: ChunkCoord) -> Option<&Arc<TerrainChunk>> {
        self.entries.get(&coord).map(|e| &e.chunk)
    }

    /// Insert as most recently used.
    ///
    /// Returns the chunk that was replaced at the same coordinate, or the
    /// one evicted to make room.
    pub fn insert(&mut self, chunk: Arc<TerrainChunk>) -> Option<Arc<TerrainChunk>> {
        let coord = chunk.coord();
        let evicted = if !self.entries.contains_key(&coord) && self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };
        let last_used = self.next_tick();
        let replaced = self.entries.insert(coord, Entry { chunk, last_used }).map(|e| e.chunk);
        replaced.or(evicted)
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Arc<TerrainChunk>> {
        self.entries.remove(&coord).map(|e| e.chunk)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.entries.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evict_oldest(&mut self) -> Option<Arc<TerrainChunk>> {
        let coord = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(&coord, _)| coord)?;
        self.remove(coord)
    }

    /// Resident chunks, least recently used first
    pub fn iter_lru(&self) -> impl Iterator<Item = &Arc<TerrainChunk>> + '_ {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_unstable_by_key(|e| e.last_used);
        entries.into_iter().map(|e| &e.chunk)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::chunk::ChunkLayout;
    use crate::terrain::height::{HeightField, HeightFieldParams};

    fn make_chunk(x: i32, z: i32) -> Arc<TerrainChunk> {
        let field = HeightField::new(HeightFieldParams::default()).unwrap();
        let layout = ChunkLayout { chunk_size: 16.0, segments: 2 };
        Arc::new(TerrainChunk::generate(ChunkCoord::new(x, z), layout, &field))
    }

    #[test]
    fn test_cache_new() {
        let cache = ChunkCache::new(10);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(ChunkCache::new(0).capacity(), 1);
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = ChunkCache::new(10);
        let chunk = make_chunk(1, 2);
        let coord = chunk.coord();

        cache.insert(chunk.clone());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(coord));

        let retrieved = cache.get(coord).unwrap();
        assert!(Arc::ptr_eq(&retrieved, &chunk));
    }

    #[test]
    fn test_cache_insert_replace() {
        let mut cache = ChunkCache::new(10);
        let coord = ChunkCoord::new(1, 2);

        assert!(cache.insert(make_chunk(1, 2)).is_none());
        let replaced = cache.insert(make_chunk(1, 2));
        assert_eq!(replaced.unwrap().coord(), coord);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_remove() {
        let mut cache = ChunkCache::new(10);
        let coord = ChunkCoord::new(1, 2);
        cache.insert(make_chunk(1, 2));

        let removed = cache.remove(coord);
        assert_eq!(removed.unwrap().coord(), coord);
        assert!(cache.is_empty());
        assert!(!cache.contains(coord));
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = ChunkCache::new(3);
        cache.insert(make_chunk(1, 0));
        cache.insert(make_chunk(2, 0));
        cache.insert(make_chunk(3, 0));

        let evicted = cache.insert(make_chunk(4, 0));
        assert_eq!(evicted.unwrap().coord(), ChunkCoord::new(1, 0));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(ChunkCoord::new(1, 0)));
        assert!(cache.contains(ChunkCoord::new(4, 0)));
    }

    #[test]
    fn test_cache_lru_access_order() {
        let mut cache = ChunkCache::new(3);
        cache.insert(make_chunk(1, 0));
        cache.insert(make_chunk(2, 0));
        cache.insert(make_chunk(3, 0));

        cache.get(ChunkCoord::new(1, 0));

        let evicted = cache.insert(make_chunk(4, 0));
        assert_eq!(evicted.unwrap().coord(), ChunkCoord::new(2, 0));
        assert!(cache.contains(ChunkCoord::new(1, 0)));
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = ChunkCache::new(2);
        cache.insert(make_chunk(1, 0));
        cache.insert(make_chunk(2, 0));
        assert!(cache.peek(ChunkCoord::new(1, 0)).is_some());

        let evicted = cache.insert(make_chunk(3, 0));
        assert_eq!(evicted.unwrap().coord(), ChunkCoord::new(1, 0));
    }

    #[test]
    fn test_iter_lru_order() {
        let mut cache = ChunkCache::new(5);
        cache.insert(make_chunk(1, 0));
        cache.insert(make_chunk(2, 0));
        cache.get(ChunkCoord::new(1, 0));
        let order: Vec<_> = cache.iter_lru().map(|c| c.coord().x).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_cache_empty_evict() {
        let mut cache = ChunkCache::new(10);
        assert!(cache.evict_oldest().is_none());
    }
}
