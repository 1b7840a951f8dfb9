#![allow(dead_code)]

use anyhow::{Result, bail};
use geo::{Coord, Rect};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use survey_coverage::core::projection::{lon_lat_to_mercator, mercator_to_lon_lat};
use survey_coverage::{CameraModel, FlatTerrain, PolygonWithId, Pose, TerrainProvider, TerrainTile, TileKey};

/// Close to the equator, where projected metres and ground metres agree.
pub const SITE: (f64, f64) = (0.0123, 0.0234);

pub fn survey_camera() -> CameraModel {
    CameraModel::new(0.035, 4.88e-6, 6000, 4000)
}

pub fn site_centre() -> Coord<f64> {
    lon_lat_to_mercator(SITE.0, SITE.1)
}

pub fn square_area(centre: Coord<f64>, half: f64) -> Rect<f64> {
    Rect::new(
        Coord { x: centre.x - half, y: centre.y - half },
        Coord { x: centre.x + half, y: centre.y + half },
    )
}

pub fn polygon_from_area(id: &str, area: Rect<f64>) -> PolygonWithId {
    let ring: Vec<(f64, f64)> = area
        .to_polygon()
        .exterior()
        .coords()
        .map(|c| {
            let ll = mercator_to_lon_lat(c.x, c.y);
            (ll.x, ll.y)
        })
        .collect();
    PolygonWithId::new(id, ring)
}

/// Serpentine nadir grid covering `area` with the given overlaps.
pub fn lawnmower(area: Rect<f64>, camera: &CameraModel, agl: f64, front: f64, side: f64) -> Vec<Pose> {
    let across = camera.width_px as f64 * camera.pixel_pitch_x / camera.focal_length * agl * (1.0 - side);
    let along = camera.height_px as f64 * camera.pixel_pitch_y / camera.focal_length * agl * (1.0 - front);
    let lines = (area.width() / across).ceil() as usize + 1;
    let shots = (area.height() / along).ceil() as usize + 1;

    let mut poses = Vec::with_capacity(lines * shots);
    for line in 0..lines {
        for shot in 0..shots {
            let step = if line % 2 == 0 { shot } else { shots - 1 - shot };
            poses.push(Pose::nadir(
                area.min().x + line as f64 * across,
                area.min().y + step as f64 * along,
                agl,
            ));
        }
    }
    poses
}

/// Flat terrain that refuses to deliver some tiles.
pub struct PatchyTerrain {
    pub flat: FlatTerrain,
    pub missing: HashSet<TileKey>,
    pub calls: AtomicUsize,
}

impl PatchyTerrain {
    pub fn new(missing: impl IntoIterator<Item = TileKey>) -> Self {
        Self {
            flat: FlatTerrain::new(0.0, 128),
            missing: missing.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TerrainProvider for PatchyTerrain {
    fn fetch(&self, key: TileKey) -> Result<TerrainTile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(&key) {
            bail!("no terrain for {key}");
        }
        self.flat.fetch(key)
    }
}
