mod common;

use approx::assert_relative_eq;
use common::*;
use survey_coverage::core::context::TileContext;
use survey_coverage::core::raster::rasterize_rings;
use survey_coverage::core::spatial::TileGeometry;
use survey_coverage::core::terrain::encode_terrain_rgb;
use survey_coverage::coverage::culling::prepare_poses;
use survey_coverage::coverage::evaluator::observe;
use survey_coverage::stats::CoverageAggregator;
use survey_coverage::tiling::{polygons_for_tile, tiles_covering};
use survey_coverage::{
    AnalysisOptions, CameraAssignment, CameraSet, HistogramConfig, Pose, TerrainTile, TileKey,
    compute_tile,
};

const NADIR_GSD: f64 = 4.88e-6 * 100.0 / 0.035;

fn single_camera() -> CameraSet {
    CameraSet::resolve(CameraAssignment::Single(survey_camera()), 0).unwrap()
}

#[test]
fn flat_square_kilometre_at_100m() {
    let zoom = 15;
    let area = square_area(site_centre(), 500.0);
    let polygons = vec![polygon_from_area("block", area)];
    let poses = lawnmower(area, &survey_camera(), 100.0, 0.6, 0.6);
    let cameras = single_camera();
    let options = AnalysisOptions {
        grid_resolution: 16,
        ..Default::default()
    };

    let mut aggregator = CoverageAggregator::new(HistogramConfig::default());
    let tiles = tiles_covering(&polygons, zoom);
    assert!(tiles.len() >= 4);

    for key in tiles {
        let tile = TerrainTile::flat(key, 256, 0.0);
        let tile_polygons = polygons_for_tile(&polygons, key);
        let result = compute_tile(&tile, &tile_polygons, &poses, &cameras, &options).unwrap();

        let mut active_seen = 0;
        for (&o, &g) in result.overlap.iter().zip(&result.gsd_min) {
            assert_eq!(o == 0, g.is_infinite());
            if o > 0 {
                active_seen += 1;
                // Two or three lines across, two or three shots along.
                assert!((4..=9).contains(&o), "unexpected overlap {o} in tile {key}");
                assert!(g as f64 >= NADIR_GSD * 0.999);
                assert!((g as f64) < NADIR_GSD * 1.045);
            }
        }
        assert_eq!(active_seen, result.active_pixels, "uncovered pixels in tile {key}");
        aggregator.merge_tile_result(result);
    }

    let summary = aggregator.polygon_summary("block").unwrap();
    assert_relative_eq!(summary.stats.min, NADIR_GSD, max_relative = 2e-3);
    assert!(summary.stats.mean < NADIR_GSD * 1.02);
    assert_eq!(summary.covered_pixels, summary.active_pixels);
    assert_relative_eq!(summary.stats.total_area_m2, 1.0e6, max_relative = 0.02);
    assert!(summary.image_count <= poses.len());
    assert!(summary.image_count > poses.len() / 2);
}

#[test]
fn pose_over_tile_seam_is_credited_once() {
    let zoom = 16;
    let key = TileKey::containing(zoom, site_centre());
    let right = TileKey::new(zoom, key.x + 1, key.y);
    let seam_x = key.bounds().max().x;
    let mid_y = key.bounds().center().y;

    let area = geo::Rect::new(
        geo::Coord { x: seam_x - 30.0, y: mid_y - 20.0 },
        geo::Coord { x: seam_x + 30.0, y: mid_y + 20.0 },
    );
    let polygons = vec![polygon_from_area("seam", area)];
    let poses = vec![Pose::nadir(seam_x, mid_y, 100.0)];
    let cameras = single_camera();

    let mut aggregator = CoverageAggregator::new(HistogramConfig::default());
    for k in [key, right] {
        let r = compute_tile(
            &TerrainTile::flat(k, 256, 0.0),
            &polygons,
            &poses,
            &cameras,
            &AnalysisOptions::default(),
        )
        .unwrap();
        assert_eq!(r.polygons.len(), 1);
        assert_eq!(r.polygons[0].pose_indices, vec![0]);
        aggregator.merge_tile_result(r);
    }

    let summary = aggregator.polygon_summary("seam").unwrap();
    assert_eq!(summary.tile_count, 2);
    assert_eq!(summary.image_count, 1);
}

/// Terrain rising 0.5 m per pixel eastward with a ridge in the middle rows.
fn sloped_tile(key: TileKey, size: usize) -> TerrainTile {
    let mut rgb = Vec::with_capacity(size * size * 3);
    for row in 0..size {
        for col in 0..size {
            let ridge = if (size / 2 - 4..size / 2 + 4).contains(&row) { 15.0 } else { 0.0 };
            rgb.extend(encode_terrain_rgb(100.0 + col as f64 * 0.5 + ridge));
        }
    }
    TerrainTile::new(key, size, size, rgb)
}

#[test]
fn culling_never_changes_the_answer() {
    let size = 128;
    let key = TileKey::containing(16, site_centre());
    let tile = sloped_tile(key, size);
    let geometry = TileGeometry::new(key, size, size).unwrap();

    let inner = geo::Rect::new(
        geometry.pixel_to_world(8.0, 100.0),
        geometry.pixel_to_world(120.0, 20.0),
    );
    let polygons = vec![polygon_from_area("slope", inner)];

    let poses: Vec<Pose> = (0..12)
        .map(|i| {
            let w = geometry.pixel_to_world(10.0 + i as f64 * 10.0, 20.0 + (i % 4) as f64 * 25.0);
            Pose::new(w.x, w.y, 260.0, 0.05 * (i % 3) as f64, -0.04 * (i % 2) as f64, 0.3 * i as f64)
        })
        .chain(std::iter::once({
            let far = geometry.pixel_to_world(900.0, 900.0);
            Pose::nadir(far.x, far.y, 260.0)
        }))
        .collect();
    let cameras = single_camera();

    // Reference: every pose tested against every polygon pixel.
    let ctx = TileContext::analyze(&tile).unwrap();
    let all = prepare_poses(&poses, &cameras, ctx.terrain.min_elevation as f64, 1.25);
    let reference = compute_tile(&tile, &polygons, &poses, &cameras, &AnalysisOptions::default()).unwrap();
    let mask = rasterize_rings(&[polygons[0].to_pixel_ring(&geometry)], size, size);
    let mut checked = 0;
    for row in 0..size {
        for col in 0..size {
            let i = row * size + col;
            if mask[i] == 0 {
                assert_eq!(reference.overlap[i], 0);
                continue;
            }
            let point = ctx.world_point(col, row);
            let normal = ctx.surface_normal(col, row);
            let brute = all
                .iter()
                .filter(|p| observe(p, &point, &normal, 1e-3).is_some())
                .count();
            assert_eq!(reference.overlap[i] as usize, brute, "pixel ({col}, {row})");
            checked += 1;
        }
    }
    assert_eq!(checked, reference.active_pixels);

    for n in [2u8, 3, 4, 8, 16, 32] {
        let options = AnalysisOptions {
            grid_resolution: n,
            ..Default::default()
        };
        let r = compute_tile(&tile, &polygons, &poses, &cameras, &options).unwrap();
        assert_eq!(r.overlap, reference.overlap, "grid {n}");
        assert_eq!(r.gsd_min, reference.gsd_min, "grid {n}");
        assert_eq!(r.polygons[0].pose_indices, reference.polygons[0].pose_indices);
    }
}
