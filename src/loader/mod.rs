pub mod cache;

pub use cache::TerrainCache;

use crate::core::spatial::TileKey;
use crate::core::terrain::TerrainTile;
use anyhow::Result;

/// Source of Terrain-RGB tiles.
///
/// `fetch` may block; the run calls it from the blocking pool. An error means
/// the tile is unavailable and the run carries on without it.
pub trait TerrainProvider: Send + Sync + 'static {
    fn fetch(&self, key: TileKey) -> Result<TerrainTile>;
}

/// Constant-elevation terrain for every tile.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub elevation: f64,
    pub size: usize,
}

impl FlatTerrain {
    pub fn new(elevation: f64, size: usize) -> Self {
        Self { elevation, size }
    }
}

impl TerrainProvider for FlatTerrain {
    fn fetch(&self, key: TileKey) -> Result<TerrainTile> {
        Ok(TerrainTile::flat(key, self.size, self.elevation))
    }
}
