use crate::core::spatial::TileKey;
use anyhow::{Result, ensure};
use nalgebra::Vector3;
use rayon::prelude::*;

const TERRAIN_RGB_OFFSET: f64 = -10000.0;
const TERRAIN_RGB_STEP: f64 = 0.1;
const TERRAIN_RGB_MAX: u32 = 0xFF_FFFF;

/// Terrain-RGB encoded tile as delivered by a provider.
///
/// `rgb` holds 3 (RGB) or 4 (RGBA, alpha ignored) bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainTile {
    pub key: TileKey,
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

impl TerrainTile {
    pub fn new(key: TileKey, width: usize, height: usize, rgb: Vec<u8>) -> Self {
        Self {
            key,
            width,
            height,
            rgb,
        }
    }

    pub fn flat(key: TileKey, size: usize, elevation: f64) -> Self {
        let pixel = encode_terrain_rgb(elevation);
        let rgb = pixel.iter().copied().cycle().take(size * size * 3).collect();
        Self::new(key, size, size, rgb)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

#[inline]
pub fn decode_pixel(r: u8, g: u8, b: u8) -> f32 {
    let raw = (r as u32) * 65536 + (g as u32) * 256 + b as u32;
    (TERRAIN_RGB_OFFSET + raw as f64 * TERRAIN_RGB_STEP) as f32
}

pub fn encode_terrain_rgb(elevation: f64) -> [u8; 3] {
    let raw = ((elevation - TERRAIN_RGB_OFFSET) / TERRAIN_RGB_STEP)
        .round()
        .clamp(0.0, TERRAIN_RGB_MAX as f64) as u32;

    [(raw >> 16) as u8, (raw >> 8) as u8, raw as u8]
}

pub fn decode_terrain_rgb(raw: &[u8], pixel_count: usize) -> Result<Vec<f32>> {
    ensure!(pixel_count > 0, "Cannot decode an empty terrain tile");
    ensure!(
        raw.len() == pixel_count * 3 || raw.len() == pixel_count * 4,
        "Terrain buffer holds {} bytes, expected {} (RGB) or {} (RGBA)",
        raw.len(),
        pixel_count * 3,
        pixel_count * 4
    );

    let stride = raw.len() / pixel_count;

    Ok(raw
        .par_chunks_exact(stride)
        .map(|px| decode_pixel(px[0], px[1], px[2]))
        .collect())
}

#[derive(Debug, Clone)]
pub struct ElevationGrid {
    pub width: usize,
    pub height: usize,
    pub elevation: Vec<f32>,
    pub min_elevation: f32,
    pub max_elevation: f32,
}

impl ElevationGrid {
    pub fn decode(tile: &TerrainTile) -> Result<Self> {
        let elevation = decode_terrain_rgb(&tile.rgb, tile.pixel_count())?;
        Self::from_elevations(tile.width, tile.height, elevation)
    }

    pub fn from_elevations(width: usize, height: usize, elevation: Vec<f32>) -> Result<Self> {
        ensure!(
            width > 0 && elevation.len() == width * height,
            "Elevation grid {}x{} does not match {} samples",
            width,
            height,
            elevation.len()
        );

        let (min, max) = elevation
            .par_chunks(width)
            .map(|chunk| {
                chunk
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(acc_min, acc_max), &val| {
                        if val.is_nan() {
                            (acc_min, acc_max)
                        } else {
                            (acc_min.min(val), acc_max.max(val))
                        }
                    })
            })
            .reduce(
                || (f32::MAX, f32::MIN),
                |(min1, max1), (min2, max2)| (min1.min(min2), max1.max(max2)),
            );

        let (min_elevation, max_elevation) = if min == f32::MAX { (0.0, 0.0) } else { (min, max) };

        Ok(Self {
            width,
            height,
            elevation,
            min_elevation,
            max_elevation,
        })
    }

    #[inline]
    pub fn at(&self, col: isize, row: isize) -> f32 {
        let c = col.clamp(0, self.width as isize - 1) as usize;
        let r = row.clamp(0, self.height as isize - 1) as usize;
        self.elevation[r * self.width + c]
    }

    /// Unit normal from a 3x3 Horn stencil, neighbours clamped at the grid edge.
    ///
    /// `cell_x`/`cell_y` are pixel sizes in metres; rows grow southwards while
    /// world y grows northwards.
    pub fn surface_normal(&self, col: usize, row: usize, cell_x: f64, cell_y: f64) -> Vector3<f64> {
        let (x, y) = (col as isize, row as isize);
        let center_z = self.at(x, y);
        let get = |dx: isize, dy: isize| -> f64 {
            let v = self.at(x + dx, y + dy);
            if v.is_nan() { center_z as f64 } else { v as f64 }
        };

        let z1 = get(-1, -1);
        let z2 = get(0, -1);
        let z3 = get(1, -1);
        let z4 = get(-1, 0);
        let z6 = get(1, 0);
        let z7 = get(-1, 1);
        let z8 = get(0, 1);
        let z9 = get(1, 1);

        let dz_dcol = ((z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7)) / (8.0 * cell_x);
        let dz_drow = ((z7 + 2.0 * z8 + z9) - (z1 + 2.0 * z2 + z3)) / (8.0 * cell_y);

        Vector3::new(-dz_dcol, dz_drow, 1.0).normalize()
    }
}
