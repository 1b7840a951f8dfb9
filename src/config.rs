use crate::core::spatial::MAX_ZOOM;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const MIN_GRID_RESOLUTION: u8 = 2;
pub const MAX_GRID_RESOLUTION: u8 = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramConfig {
    pub max_bins: usize,
    /// Metres of GSD.
    pub min_bin_width: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            max_bins: 20,
            min_bin_width: 0.01,
        }
    }
}

/// Per-tile evaluation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisOptions {
    /// Stop testing candidates for a pixel once this many poses see it.
    pub early_exit_overlap_cap: usize,
    pub grid_resolution: u8,
    pub inner_clip_meters: f64,
    pub footprint_margin: f64,
    pub min_cos_incidence: f64,
    pub histogram: HistogramConfig,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            early_exit_overlap_cap: usize::MAX,
            grid_resolution: 8,
            inner_clip_meters: 0.0,
            footprint_margin: 1.25,
            min_cos_incidence: 1e-3,
            histogram: HistogramConfig::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn grid_resolution(&self) -> usize {
        self.grid_resolution
            .clamp(MIN_GRID_RESOLUTION, MAX_GRID_RESOLUTION) as usize
    }

    pub fn overlap_cap(&self) -> usize {
        self.early_exit_overlap_cap.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.footprint_margin.is_finite() && self.footprint_margin >= 1.0,
            "Footprint margin must be at least 1.0, got {}",
            self.footprint_margin
        );
        ensure!(
            (0.0..1.0).contains(&self.min_cos_incidence),
            "Minimum incidence cosine must lie in [0, 1), got {}",
            self.min_cos_incidence
        );
        ensure!(
            self.inner_clip_meters >= 0.0,
            "Inner clip distance cannot be negative, got {}",
            self.inner_clip_meters
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub zoom: u8,
    pub workers: Option<usize>,
    pub cache_capacity: usize,
    pub show_progress: bool,
    pub options: AnalysisOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            zoom: 16,
            workers: None,
            cache_capacity: 256,
            show_progress: false,
            options: AnalysisOptions::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid run configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.zoom <= MAX_ZOOM, "Zoom {} exceeds maximum {}", self.zoom, MAX_ZOOM);
        self.options.validate()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}
