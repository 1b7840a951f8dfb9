use crate::core::spatial::TileKey;
use crate::core::terrain::TerrainTile;
use crate::loader::TerrainProvider;
use anyhow::Result;
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Bounded cache of raw terrain tiles keyed by `z/x/y`.
///
/// Callers always receive their own copy of the buffer.
pub struct TerrainCache {
    entries: Mutex<LruCache<TileKey, TerrainTile>>,
}

impl TerrainCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<TileKey, TerrainTile>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &TileKey) -> Option<TerrainTile> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, tile: TerrainTile) {
        self.lock().put(tile.key, tile);
    }

    pub fn get_or_fetch(&self, key: TileKey, provider: &dyn TerrainProvider) -> Result<TerrainTile> {
        if let Some(tile) = self.get(&key) {
            debug!("Terrain cache hit for {key}");
            return Ok(tile);
        }

        // Fetch outside the lock so slow providers don't serialize workers.
        let tile = provider.fetch(key)?;
        self.insert(tile.clone());
        Ok(tile)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
