use crate::config::HistogramConfig;
use crate::core::spatial::TileKey;
use crate::coverage::TileResult;
use crate::stats::{GSDStats, PolygonTileStats};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Cumulative coverage of one polygon across every tile merged so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolygonSummary {
    pub polygon_id: String,
    pub stats: GSDStats,
    /// Distinct poses that imaged the polygon anywhere.
    pub image_count: usize,
    pub tile_count: usize,
    pub active_pixels: usize,
    pub covered_pixels: usize,
}

/// Per-polygon, per-tile coverage state of a run.
///
/// Merging a tile replaces everything previously recorded for that tile, so
/// recomputing a tile never double counts it.
#[derive(Debug, Default)]
pub struct CoverageAggregator {
    polygons: HashMap<String, BTreeMap<TileKey, PolygonTileStats>>,
    tiles: BTreeMap<TileKey, GSDStats>,
    histogram: HistogramConfig,
}

impl CoverageAggregator {
    pub fn new(histogram: HistogramConfig) -> Self {
        Self {
            histogram,
            ..Default::default()
        }
    }

    pub fn merge_tile_result(&mut self, result: TileResult) {
        let key = result.key;
        for tiles in self.polygons.values_mut() {
            tiles.remove(&key);
        }
        self.polygons.retain(|_, tiles| !tiles.is_empty());
        for stats in result.polygons {
            self.polygons
                .entry(stats.polygon_id.clone())
                .or_default()
                .insert(key, stats);
        }
        self.tiles.insert(key, result.stats);
    }

    /// Forgets every tile recorded for `polygon_id`.
    pub fn invalidate_polygon(&mut self, polygon_id: &str) {
        self.polygons.remove(polygon_id);
    }

    /// Keeps only the tiles of `polygon_id` that are still in `tiles`.
    pub fn prune_polygon(&mut self, polygon_id: &str, tiles: &HashSet<TileKey>) {
        if let Some(entries) = self.polygons.get_mut(polygon_id) {
            entries.retain(|key, _| tiles.contains(key));
            if entries.is_empty() {
                self.polygons.remove(polygon_id);
            }
        }
    }

    /// Drops all state for tiles outside `tiles`.
    pub fn retain_tiles(&mut self, tiles: &HashSet<TileKey>) {
        for entries in self.polygons.values_mut() {
            entries.retain(|key, _| tiles.contains(key));
        }
        self.polygons.retain(|_, entries| !entries.is_empty());
        self.tiles.retain(|key, _| tiles.contains(key));
    }

    pub fn clear(&mut self) {
        self.polygons.clear();
        self.tiles.clear();
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains_tile(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    pub fn polygon_ids(&self) -> impl Iterator<Item = &str> {
        self.polygons.keys().map(String::as_str)
    }

    pub fn polygon_summary(&self, polygon_id: &str) -> Option<PolygonSummary> {
        let tiles = self.polygons.get(polygon_id)?;

        let images: BTreeSet<u32> = tiles
            .values()
            .flat_map(|t| t.pose_indices.iter().copied())
            .collect();

        Some(PolygonSummary {
            polygon_id: polygon_id.to_string(),
            stats: GSDStats::merge(tiles.values().map(|t| &t.stats), &self.histogram),
            image_count: images.len(),
            tile_count: tiles.len(),
            active_pixels: tiles.values().map(|t| t.active_pixels).sum(),
            covered_pixels: tiles.values().map(|t| t.covered_pixels).sum(),
        })
    }

    /// Tile-level stats merged over every tile. Pixels shared by several
    /// polygons count once here.
    pub fn overall_stats(&self) -> GSDStats {
        GSDStats::merge(self.tiles.values(), &self.histogram)
    }
}
