use crate::config::AnalysisOptions;
use crate::core::context::TileContext;
use crate::coverage::culling::PreparedPose;
use crate::coverage::grid::PoseGrid;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashSet;

const MIN_RANGE: f64 = 1e-6;

/// Dense per-pixel output of one tile evaluation.
pub struct Evaluation {
    pub overlap: Vec<u16>,
    pub gsd_min: Vec<f32>,
    /// `(polygon slot, global pose index)` pairs that hit at least one pixel.
    pub hits: HashSet<(usize, u32)>,
}

/// GSD of `point` as seen from `pose`, or `None` if it is not imaged.
///
/// Rejects points outside the sensor, behind the camera, at zero range, or
/// viewed at an incidence whose cosine is at most `min_cos_incidence`.
#[inline]
pub fn observe(
    pose: &PreparedPose,
    point: &Vector3<f64>,
    normal: &Vector3<f64>,
    min_cos_incidence: f64,
) -> Option<f64> {
    pose.frame.project(pose.camera, point)?;

    let to_camera = pose.frame.position - point;
    let range = to_camera.norm();
    if range < MIN_RANGE {
        return None;
    }

    let cos_incidence = to_camera.dot(normal) / range;
    if cos_incidence <= min_cos_incidence {
        return None;
    }

    Some(range * pose.gsd_factor / cos_incidence)
}

/// Runs the per-pixel loop over `mask` rows in parallel.
///
/// `polygon_masks` are the per-polygon masks whose union is `mask`; their
/// positions are the slots reported in [`Evaluation::hits`].
pub fn evaluate(
    ctx: &TileContext,
    mask: &[u8],
    polygon_masks: &[Vec<u8>],
    poses: &[PreparedPose],
    grid: &PoseGrid,
    options: &AnalysisOptions,
) -> Evaluation {
    let width = ctx.geometry.width;
    let pixel_count = ctx.geometry.pixel_count();
    let cap = options.overlap_cap();
    let min_cos = options.min_cos_incidence;

    let mut overlap = vec![0u16; pixel_count];
    let mut gsd_min = vec![f32::INFINITY; pixel_count];

    let hits = overlap
        .par_chunks_mut(width)
        .zip(gsd_min.par_chunks_mut(width))
        .enumerate()
        .map(|(row, (overlap_row, gsd_row))| {
            let mut row_hits = HashSet::new();
            let mut seen = Vec::new();

            for col in 0..width {
                let i = row * width + col;
                if mask[i] == 0 {
                    continue;
                }

                let point = ctx.world_point(col, row);
                let normal = ctx.surface_normal(col, row);
                let mut count = 0usize;
                let mut best = f64::INFINITY;
                seen.clear();

                for &slot in grid.candidates(col, row) {
                    if count >= cap {
                        break;
                    }
                    let pose = &poses[slot as usize];
                    if !pose.within_footprint(point.x, point.y) {
                        continue;
                    }
                    if let Some(gsd) = observe(pose, &point, &normal, min_cos) {
                        count += 1;
                        best = best.min(gsd);
                        seen.push(pose.index);
                    }
                }

                if count == 0 {
                    continue;
                }

                overlap_row[col] = count.min(u16::MAX as usize) as u16;
                gsd_row[col] = best as f32;

                for (polygon, polygon_mask) in polygon_masks.iter().enumerate() {
                    if polygon_mask[i] != 0 {
                        row_hits.extend(seen.iter().map(|&pose| (polygon, pose)));
                    }
                }
            }

            row_hits
        })
        .reduce(HashSet::new, |mut a, b| {
            if a.len() < b.len() {
                return b.into_iter().chain(a).collect();
            }
            a.extend(b);
            a
        });

    Evaluation {
        overlap,
        gsd_min,
        hits,
    }
}
