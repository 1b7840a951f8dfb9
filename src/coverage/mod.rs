pub mod culling;
pub mod evaluator;
pub mod grid;

use crate::camera::{CameraSet, Pose};
use crate::config::AnalysisOptions;
use crate::core::context::TileContext;
use crate::core::polygon::PolygonWithId;
use crate::core::raster::{clip_inner_edges, count_active, rasterize_rings, union_into};
use crate::core::spatial::{TileGeometry, TileKey};
use crate::core::terrain::TerrainTile;
use crate::stats::{GSDStats, PolygonTileStats};
use anyhow::Result;
use culling::{cull_by_footprint, prepare_poses};
use evaluator::evaluate;
use grid::PoseGrid;
use log::debug;
use std::collections::BTreeSet;

/// Output of one tile computation.
///
/// `overlap[i] == 0` exactly when `gsd_min[i]` is infinite.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub key: TileKey,
    pub width: usize,
    pub height: usize,
    pub overlap: Vec<u16>,
    pub gsd_min: Vec<f32>,
    pub max_overlap: u16,
    pub min_gsd: f64,
    pub active_pixels: usize,
    pub pixel_area_m2: f64,
    pub stats: GSDStats,
    pub polygons: Vec<PolygonTileStats>,
}

impl TileResult {
    pub fn empty(key: TileKey, width: usize, height: usize, pixel_area_m2: f64) -> Self {
        Self {
            key,
            width,
            height,
            overlap: vec![0; width * height],
            gsd_min: vec![f32::INFINITY; width * height],
            max_overlap: 0,
            min_gsd: f64::INFINITY,
            active_pixels: 0,
            pixel_area_m2,
            stats: GSDStats::default(),
            polygons: Vec::new(),
        }
    }

    pub fn covered_pixels(&self) -> usize {
        self.overlap.iter().filter(|&&o| o > 0).count()
    }
}

/// Rasterizes each valid polygon separately, applying the inner-edge clip.
///
/// Returns the polygon positions in `polygons` alongside their masks.
fn polygon_masks(
    geometry: &TileGeometry,
    polygons: &[PolygonWithId],
    clip_px: f64,
) -> (Vec<usize>, Vec<Vec<u8>>) {
    polygons
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_valid())
        .map(|(i, polygon)| {
            let rings = vec![polygon.to_pixel_ring(geometry)];
            let mut mask = rasterize_rings(&rings, geometry.width, geometry.height);
            clip_inner_edges(&mut mask, geometry.width, &rings, clip_px);
            (i, mask)
        })
        .filter(|(_, mask)| mask.iter().any(|&m| m != 0))
        .unzip()
}

/// Computes overlap and best GSD for every polygon pixel of one tile.
///
/// `poses` is the whole run's pose list; indices reported in the result refer
/// to it. Invalid options and undecodable tiles are errors.
pub fn compute_tile(
    tile: &TerrainTile,
    polygons: &[PolygonWithId],
    poses: &[Pose],
    cameras: &CameraSet,
    options: &AnalysisOptions,
) -> Result<TileResult> {
    options.validate()?;
    let ctx = TileContext::analyze(tile)?;
    let geometry = ctx.geometry;

    let ground_pixel = ctx.pixel_area_m2.sqrt();
    let clip_px = if options.inner_clip_meters > 0.0 && ground_pixel > 0.0 {
        options.inner_clip_meters / ground_pixel
    } else {
        0.0
    };

    let (slots, masks) = polygon_masks(&geometry, polygons, clip_px);
    let mut mask = vec![0u8; geometry.pixel_count()];
    for m in &masks {
        union_into(&mut mask, m);
    }

    let active_pixels = count_active(&mask);
    if active_pixels == 0 {
        debug!("Tile {}: no active pixels, skipped", geometry.key);
        return Ok(TileResult::empty(
            geometry.key,
            geometry.width,
            geometry.height,
            ctx.pixel_area_m2,
        ));
    }

    let prepared = prepare_poses(
        poses,
        cameras,
        ctx.terrain.min_elevation as f64,
        options.footprint_margin,
    );
    let candidates = cull_by_footprint(prepared, &geometry.bounds());
    let grid = PoseGrid::build(&candidates, &geometry, options.grid_resolution());

    debug!(
        "{ctx}: {active_pixels} active px, {}/{} poses after culling, {}x{} grid",
        candidates.len(),
        poses.len(),
        grid.resolution(),
        grid.resolution()
    );

    let eval = evaluate(&ctx, &mask, &masks, &candidates, &grid, options);

    let mut pose_sets = vec![BTreeSet::new(); masks.len()];
    for &(slot, pose) in &eval.hits {
        pose_sets[slot].insert(pose);
    }

    let hist = &options.histogram;
    let covered = |m: &[u8]| -> Vec<f32> {
        m.iter()
            .zip(&eval.gsd_min)
            .filter(|&(&m, g)| m != 0 && g.is_finite())
            .map(|(_, &g)| g)
            .collect()
    };

    let polygon_stats = slots
        .iter()
        .zip(&masks)
        .zip(pose_sets)
        .map(|((&i, m), seen)| {
            let samples = covered(m);
            PolygonTileStats {
                polygon_id: polygons[i].id.clone(),
                active_pixels: count_active(m),
                covered_pixels: samples.len(),
                stats: GSDStats::from_samples(&samples, ctx.pixel_area_m2, hist),
                pose_indices: seen.into_iter().collect(),
            }
        })
        .collect();

    let tile_samples = covered(&mask);
    let stats = GSDStats::from_samples(&tile_samples, ctx.pixel_area_m2, hist);
    let max_overlap = eval.overlap.iter().copied().max().unwrap_or(0);
    let min_gsd = if stats.is_empty() { f64::INFINITY } else { stats.min };

    Ok(TileResult {
        key: geometry.key,
        width: geometry.width,
        height: geometry.height,
        overlap: eval.overlap,
        gsd_min: eval.gsd_min,
        max_overlap,
        min_gsd,
        active_pixels,
        pixel_area_m2: ctx.pixel_area_m2,
        stats,
        polygons: polygon_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraAssignment, CameraModel};
    use crate::core::projection::mercator_to_lon_lat;
    use approx::assert_relative_eq;

    fn setup() -> (TerrainTile, CameraSet) {
        let key = TileKey::from_lon_lat(0.003, 0.003, 16);
        let cams = CameraSet::resolve(
            CameraAssignment::Single(CameraModel::new(0.035, 4.88e-6, 6000, 4000)),
            0,
        )
        .unwrap();
        (TerrainTile::flat(key, 128, 0.0), cams)
    }

    /// Polygon over the given pixel window of the tile, in lon/lat.
    fn window(tile: &TerrainTile, id: &str, c0: f64, r0: f64, c1: f64, r1: f64) -> PolygonWithId {
        let g = TileGeometry::new(tile.key, tile.width, tile.height).unwrap();
        let ring: Vec<(f64, f64)> = [(c0, r0), (c1, r0), (c1, r1), (c0, r1)]
            .iter()
            .map(|&(c, r)| {
                let w = g.pixel_to_world(c, r);
                let ll = mercator_to_lon_lat(w.x, w.y);
                (ll.x, ll.y)
            })
            .collect();
        PolygonWithId::new(id, ring)
    }

    fn pose_over(tile: &TerrainTile, col: f64, row: f64, z: f64) -> Pose {
        let g = TileGeometry::new(tile.key, tile.width, tile.height).unwrap();
        let w = g.pixel_to_world(col, row);
        Pose::nadir(w.x, w.y, z)
    }

    #[test]
    fn overlap_and_gsd_agree_everywhere() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 10.0, 10.0, 120.0, 90.0)];
        let poses = vec![
            pose_over(&tile, 40.0, 40.0, 100.0),
            pose_over(&tile, 50.0, 44.0, 100.0),
            pose_over(&tile, 110.0, 80.0, 60.0),
        ];
        let r = compute_tile(&tile, &polygons, &poses, &cams, &AnalysisOptions::default()).unwrap();

        assert!(r.max_overlap >= 2);
        for (o, g) in r.overlap.iter().zip(&r.gsd_min) {
            assert_eq!(*o == 0, g.is_infinite());
        }
        assert_eq!(r.polygons.len(), 1);
        assert_eq!(r.polygons[0].pose_indices, vec![0, 1, 2]);
        assert_eq!(r.polygons[0].covered_pixels, r.covered_pixels());
    }

    #[test]
    fn nadir_flat_gsd_matches_closed_form() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 60.0, 60.0, 68.0, 68.0)];
        let poses = vec![pose_over(&tile, 64.0, 64.0, 100.0)];
        let r = compute_tile(&tile, &polygons, &poses, &cams, &AnalysisOptions::default()).unwrap();

        assert_eq!(r.active_pixels, 64);
        assert_eq!(r.covered_pixels(), 64);
        // Best GSD sits near the nadir point; off-nadir pixels are a little coarser.
        assert_relative_eq!(r.min_gsd, 0.013943, max_relative = 2e-3);
        assert!(r.stats.max < 0.0148);
    }

    #[test]
    fn zero_active_pixels_short_circuit() {
        let (tile, cams) = setup();
        let poses = vec![pose_over(&tile, 64.0, 64.0, 100.0)];
        let degenerate = PolygonWithId::new("line", vec![(0.001, 0.001), (0.002, 0.002)]);
        let r = compute_tile(&tile, &[degenerate], &poses, &cams, &AnalysisOptions::default()).unwrap();
        assert_eq!(r.active_pixels, 0);
        assert_eq!(r.max_overlap, 0);
        assert!(r.polygons.is_empty());
        assert!(r.gsd_min.iter().all(|g| g.is_infinite()));
    }

    #[test]
    fn empty_pose_list_yields_uncovered_tile() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 10.0, 10.0, 20.0, 20.0)];
        let r = compute_tile(&tile, &polygons, &[], &cams, &AnalysisOptions::default()).unwrap();
        assert_eq!(r.active_pixels, 100);
        assert_eq!(r.covered_pixels(), 0);
        assert!(r.polygons[0].pose_indices.is_empty());
        assert!(r.polygons[0].stats.is_empty());
    }

    #[test]
    fn early_exit_caps_overlap() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 60.0, 60.0, 68.0, 68.0)];
        let poses: Vec<Pose> = (0..5)
            .map(|i| pose_over(&tile, 62.0 + i as f64, 64.0, 100.0))
            .collect();

        let full = compute_tile(&tile, &polygons, &poses, &cams, &AnalysisOptions::default()).unwrap();
        assert_eq!(full.max_overlap, 5);

        let options = AnalysisOptions {
            early_exit_overlap_cap: 2,
            ..Default::default()
        };
        let capped = compute_tile(&tile, &polygons, &poses, &cams, &options).unwrap();
        assert_eq!(capped.max_overlap, 2);
        assert_eq!(capped.covered_pixels(), full.covered_pixels());
    }

    #[test]
    fn overlapping_polygons_are_credited_separately() {
        let (tile, cams) = setup();
        let polygons = vec![
            window(&tile, "west", 0.0, 40.0, 64.0, 80.0),
            window(&tile, "east", 48.0, 40.0, 128.0, 80.0),
        ];
        let poses = vec![pose_over(&tile, 20.0, 60.0, 60.0), pose_over(&tile, 110.0, 60.0, 60.0)];
        let r = compute_tile(&tile, &polygons, &poses, &cams, &AnalysisOptions::default()).unwrap();

        assert_eq!(r.active_pixels, 128 * 40);
        let west = r.polygons.iter().find(|p| p.polygon_id == "west").unwrap();
        let east = r.polygons.iter().find(|p| p.polygon_id == "east").unwrap();
        assert_eq!(west.active_pixels, 64 * 40);
        assert_eq!(east.active_pixels, 80 * 40);
        assert_eq!(west.pose_indices, vec![0]);
        assert_eq!(east.pose_indices, vec![1]);
    }

    #[test]
    fn inner_clip_shrinks_polygon() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 20.0, 20.0, 60.0, 60.0)];
        let poses = vec![pose_over(&tile, 40.0, 40.0, 100.0)];
        let plain = compute_tile(&tile, &polygons, &poses, &cams, &AnalysisOptions::default()).unwrap();

        let ground_pixel = plain.pixel_area_m2.sqrt();
        let options = AnalysisOptions {
            inner_clip_meters: 4.0 * ground_pixel,
            ..Default::default()
        };
        let clipped = compute_tile(&tile, &polygons, &poses, &cams, &options).unwrap();
        assert_eq!(plain.active_pixels, 40 * 40);
        assert_eq!(clipped.active_pixels, 32 * 32);
    }

    #[test]
    fn margin_below_one_is_refused() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 0.0, 0.0, 128.0, 128.0)];
        let poses = vec![pose_over(&tile, 64.0, 64.0, 100.0)];
        let options = AnalysisOptions {
            footprint_margin: 0.5,
            ..Default::default()
        };
        assert!(compute_tile(&tile, &polygons, &poses, &cams, &options).is_err());
    }

    #[test]
    fn unit_margin_keeps_every_visible_pixel() {
        let (tile, cams) = setup();
        let polygons = vec![window(&tile, "a", 0.0, 0.0, 128.0, 128.0)];
        let poses = vec![pose_over(&tile, 64.0, 64.0, 100.0)];
        let options = AnalysisOptions {
            footprint_margin: 1.0,
            ..Default::default()
        };
        let r = compute_tile(&tile, &polygons, &poses, &cams, &options).unwrap();

        let ctx = TileContext::analyze(&tile).unwrap();
        let prepared = prepare_poses(&poses, &cams, ctx.terrain.min_elevation as f64, 1.0);
        let mut visible = 0;
        for row in 0..tile.height {
            for col in 0..tile.width {
                let seen = evaluator::observe(
                    &prepared[0],
                    &ctx.world_point(col, row),
                    &ctx.surface_normal(col, row),
                    options.min_cos_incidence,
                )
                .is_some();
                if seen {
                    visible += 1;
                    assert_eq!(r.overlap[row * tile.width + col], 1, "pixel ({col}, {row})");
                }
            }
        }
        assert!(visible > 0);
        assert_eq!(r.covered_pixels(), visible);
    }
}
