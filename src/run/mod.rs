pub mod task;

pub use task::{CancelFlag, TileOutcome, TileTask};

use crate::camera::{CameraAssignment, CameraSet, Pose};
use crate::config::{AnalysisOptions, RunConfig};
use crate::core::polygon::PolygonWithId;
use crate::core::spatial::TileKey;
use crate::loader::{TerrainCache, TerrainProvider};
use crate::stats::{CoverageAggregator, GSDStats, PolygonSummary};
use crate::tiling::{polygons_for_tile, tiles_covering};
use crate::utils::progress::create_progress_bar;
use anyhow::{Result, ensure};
use futures::StreamExt;
use futures::stream;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tap::Pipe;
use task::dispatch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub tiles_requested: usize,
    pub computed: usize,
    pub missing: usize,
    pub failed: usize,
    /// Tiles whose results were still current and not recomputed.
    pub skipped: usize,
    pub cancelled: bool,
}

/// One coverage analysis: inputs, terrain cache and accumulated results.
///
/// Results persist across `execute` calls. Changing poses, cameras or options
/// discards them; changing polygons only discards what the edit touched.
pub struct AnalysisRun {
    config: RunConfig,
    polygons: Vec<PolygonWithId>,
    poses: Arc<[Pose]>,
    assignment: CameraAssignment,
    cameras: Arc<CameraSet>,
    options: Arc<AnalysisOptions>,
    cache: Arc<TerrainCache>,
    aggregator: CoverageAggregator,
    completed: HashSet<TileKey>,
}

impl AnalysisRun {
    pub fn new(
        config: RunConfig,
        polygons: Vec<PolygonWithId>,
        poses: Vec<Pose>,
        assignment: CameraAssignment,
    ) -> Result<Self> {
        config.validate()?;
        ensure_unique_ids(&polygons)?;
        let cameras = CameraSet::resolve(assignment.clone(), poses.len())?.pipe(Arc::new);

        Ok(Self {
            options: Arc::new(config.options.clone()),
            aggregator: CoverageAggregator::new(config.options.histogram.clone()),
            cache: Arc::new(TerrainCache::new(config.cache_capacity)),
            config,
            polygons,
            poses: poses.into(),
            assignment,
            cameras,
            completed: HashSet::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn polygons(&self) -> &[PolygonWithId] {
        &self.polygons
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn cache(&self) -> &TerrainCache {
        &self.cache
    }

    /// Computes every covering tile that has no current result.
    pub async fn execute(&mut self, provider: Arc<dyn TerrainProvider>, cancel: &CancelFlag) -> RunReport {
        let zoom = self.config.zoom;
        let tiles = tiles_covering(&self.polygons, zoom);
        let wanted: HashSet<TileKey> = tiles.iter().copied().collect();

        self.aggregator.retain_tiles(&wanted);
        self.completed.retain(|key| wanted.contains(key));

        let pending: Vec<TileKey> = tiles
            .iter()
            .copied()
            .filter(|key| !self.completed.contains(key))
            .collect();

        let mut report = RunReport {
            tiles_requested: tiles.len(),
            skipped: tiles.len() - pending.len(),
            ..Default::default()
        };

        let workers = self.config.worker_count();
        info!(
            "Coverage run at zoom {zoom}: {} tiles ({} current), {} polygons, {} poses, {workers} workers",
            report.tiles_requested,
            report.skipped,
            self.polygons.len(),
            self.poses.len()
        );

        let bar = create_progress_bar(pending.len() as u64, "Computing tile coverage", self.config.show_progress);

        let tasks: Vec<TileTask> = pending
            .into_iter()
            .map(|key| TileTask {
                key,
                polygons: polygons_for_tile(&self.polygons, key),
                poses: Arc::clone(&self.poses),
                cameras: Arc::clone(&self.cameras),
                options: Arc::clone(&self.options),
            })
            .collect();

        let cache = Arc::clone(&self.cache);
        let mut outcomes = stream::iter(tasks)
            .map(|task| dispatch(task, Arc::clone(&cache), Arc::clone(&provider), cancel.clone()))
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                TileOutcome::Computed(result) => {
                    debug!(
                        "Tile {}: {} active px, max overlap {}",
                        result.key, result.active_pixels, result.max_overlap
                    );
                    self.completed.insert(result.key);
                    self.aggregator.merge_tile_result(result);
                    report.computed += 1;
                }
                TileOutcome::Missing { key, error } => {
                    warn!("Terrain tile {key} unavailable, skipping: {error:#}");
                    report.missing += 1;
                }
                TileOutcome::Failed { key, error } => {
                    warn!("Tile {key} failed: {error:#}");
                    report.failed += 1;
                }
                TileOutcome::Cancelled { .. } => report.cancelled = true,
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Coverage run finished: {} computed, {} missing, {} failed, {} current{}",
            report.computed,
            report.missing,
            report.failed,
            report.skipped,
            if report.cancelled { ", cancelled" } else { "" }
        );

        report
    }

    /// Replaces the polygon set, discarding results only where geometry changed.
    pub fn set_polygons(&mut self, polygons: Vec<PolygonWithId>) -> Result<()> {
        ensure_unique_ids(&polygons)?;
        let zoom = self.config.zoom;
        let old: HashMap<&str, &PolygonWithId> =
            self.polygons.iter().map(|p| (p.id.as_str(), p)).collect();
        let new: HashMap<&str, &PolygonWithId> =
            polygons.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut touched: Vec<PolygonWithId> = Vec::new();
        let mut changed: Vec<String> = Vec::new();
        for (id, polygon) in &new {
            match old.get(id) {
                Some(prev) if prev.ring == polygon.ring => {}
                Some(prev) => {
                    touched.push((*prev).clone());
                    touched.push((*polygon).clone());
                    changed.push(id.to_string());
                }
                None => {
                    touched.push((*polygon).clone());
                    changed.push(id.to_string());
                }
            }
        }
        for (id, prev) in &old {
            if !new.contains_key(id) {
                touched.push((*prev).clone());
                changed.push(id.to_string());
            }
        }

        for id in &changed {
            self.aggregator.invalidate_polygon(id);
        }
        for key in tiles_covering(&touched, zoom) {
            self.completed.remove(&key);
        }
        if !changed.is_empty() {
            debug!("Polygons changed: {}", changed.join(", "));
        }

        self.polygons = polygons;

        for polygon in &self.polygons {
            let tiles: HashSet<TileKey> = tiles_covering(std::slice::from_ref(polygon), zoom)
                .into_iter()
                .collect();
            self.aggregator.prune_polygon(&polygon.id, &tiles);
        }
        let wanted: HashSet<TileKey> = tiles_covering(&self.polygons, zoom).into_iter().collect();
        self.aggregator.retain_tiles(&wanted);
        self.completed.retain(|key| wanted.contains(key));
        Ok(())
    }

    pub fn set_poses(&mut self, poses: Vec<Pose>) -> Result<()> {
        self.cameras = CameraSet::resolve(self.assignment.clone(), poses.len())?.pipe(Arc::new);
        self.poses = poses.into();
        self.reset();
        Ok(())
    }

    pub fn set_cameras(&mut self, assignment: CameraAssignment) -> Result<()> {
        self.cameras = CameraSet::resolve(assignment.clone(), self.poses.len())?.pipe(Arc::new);
        self.assignment = assignment;
        self.reset();
        Ok(())
    }

    pub fn set_options(&mut self, options: AnalysisOptions) -> Result<()> {
        options.validate()?;
        self.aggregator = CoverageAggregator::new(options.histogram.clone());
        self.options = Arc::new(options.clone());
        self.config.options = options;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.aggregator.clear();
        self.completed.clear();
    }

    pub fn polygon_summary(&self, polygon_id: &str) -> Option<PolygonSummary> {
        self.aggregator.polygon_summary(polygon_id)
    }

    /// Summaries in polygon order; polygons with no computed tile are absent.
    pub fn polygon_summaries(&self) -> Vec<PolygonSummary> {
        self.polygons
            .iter()
            .filter_map(|p| self.polygon_summary(&p.id))
            .collect()
    }

    pub fn overall_stats(&self) -> GSDStats {
        self.aggregator.overall_stats()
    }
}

/// Results are keyed by polygon id, so two polygons sharing one would merge.
fn ensure_unique_ids(polygons: &[PolygonWithId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(polygons.len());
    for polygon in polygons {
        ensure!(seen.insert(polygon.id.as_str()), "Duplicate polygon id '{}'", polygon.id);
    }
    Ok(())
}
