pub mod aggregator;
pub mod histogram;

pub use aggregator::{CoverageAggregator, PolygonSummary};

use crate::config::HistogramConfig;
use histogram::BinAxis;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    /// Bin centre, metres per pixel.
    pub gsd: f64,
    pub count: u64,
    pub area_m2: f64,
}

/// Summary of a set of GSD samples. An empty summary has zeroed fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GSDStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
    pub total_area_m2: f64,
    pub histogram: Vec<HistogramBin>,
}

impl GSDStats {
    /// Builds stats from covered-pixel GSDs that each represent `area_per_sample` m².
    /// Non-finite samples are ignored.
    pub fn from_samples(samples: &[f32], area_per_sample: f64, config: &HistogramConfig) -> Self {
        let (min, max, sum, count) = samples
            .par_iter()
            .map(|&v| v as f64)
            .filter(|v| v.is_finite())
            .fold(
                || (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0u64),
                |(lo, hi, s, n), v| (lo.min(v), hi.max(v), s + v, n + 1),
            )
            .reduce(
                || (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0u64),
                |a, b| (a.0.min(b.0), a.1.max(b.1), a.2 + b.2, a.3 + b.3),
            );

        if count == 0 {
            return Self::default();
        }

        let axis = BinAxis::new(min, max, config);
        let mut counts = vec![0u64; axis.bins];
        for v in samples.iter().map(|&v| v as f64).filter(|v| v.is_finite()) {
            counts[axis.index(v)] += 1;
        }

        let histogram = counts
            .into_iter()
            .enumerate()
            .filter(|&(_, c)| c > 0)
            .map(|(i, c)| HistogramBin {
                gsd: axis.center(i),
                count: c,
                area_m2: c as f64 * area_per_sample,
            })
            .collect();

        Self {
            min,
            max,
            mean: sum / count as f64,
            count,
            total_area_m2: count as f64 * area_per_sample,
            histogram,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Merges summaries, re-binning every histogram onto one shared axis
    /// spanning the global min and max. Counts and areas are preserved.
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a GSDStats>, config: &HistogramConfig) -> Self {
        let parts: Vec<&GSDStats> = parts.into_iter().filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            return Self::default();
        }

        let min = parts.iter().map(|s| s.min).fold(f64::INFINITY, f64::min);
        let max = parts.iter().map(|s| s.max).fold(f64::NEG_INFINITY, f64::max);
        let count: u64 = parts.iter().map(|s| s.count).sum();
        let weighted: f64 = parts.iter().map(|s| s.mean * s.count as f64).sum();
        let total_area_m2: f64 = parts.iter().map(|s| s.total_area_m2).sum();

        let axis = BinAxis::new(min, max, config);
        let mut bins = vec![(0u64, 0.0f64); axis.bins];
        for bin in parts.iter().flat_map(|s| s.histogram.iter()) {
            let slot = &mut bins[axis.index(bin.gsd)];
            slot.0 += bin.count;
            slot.1 += bin.area_m2;
        }

        let histogram = bins
            .into_iter()
            .enumerate()
            .filter(|&(_, (c, _))| c > 0)
            .map(|(i, (count, area_m2))| HistogramBin {
                gsd: axis.center(i),
                count,
                area_m2,
            })
            .collect();

        Self {
            min,
            max,
            mean: weighted / count as f64,
            count,
            total_area_m2,
            histogram,
        }
    }
}

/// Coverage of one polygon inside one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonTileStats {
    pub polygon_id: String,
    pub active_pixels: usize,
    pub covered_pixels: usize,
    pub stats: GSDStats,
    /// Sorted, unique global indices of poses that imaged the polygon here.
    pub pose_indices: Vec<u32>,
}
