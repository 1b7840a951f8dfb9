use crate::core::projection::{ORIGIN_SHIFT, WORLD_SIZE, lon_lat_to_mercator};
use anyhow::{Result, anyhow, ensure};
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const MAX_ZOOM: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    pub fn tiles_per_axis(z: u8) -> u32 {
        1u32 << z.min(MAX_ZOOM)
    }

    pub fn span(z: u8) -> f64 {
        WORLD_SIZE / Self::tiles_per_axis(z) as f64
    }

    /// Tile bounds in projected metres. Tile rows grow southwards.
    pub fn bounds(&self) -> Rect<f64> {
        let span = Self::span(self.z);
        let min_x = -ORIGIN_SHIFT + self.x as f64 * span;
        let max_y = ORIGIN_SHIFT - self.y as f64 * span;

        Rect::new(
            Coord { x: min_x, y: max_y - span },
            Coord { x: min_x + span, y: max_y },
        )
    }

    pub fn containing(z: u8, world: Coord<f64>) -> Self {
        let span = Self::span(z);
        let last = (Self::tiles_per_axis(z) - 1) as f64;

        let x = ((world.x + ORIGIN_SHIFT) / span).floor().clamp(0.0, last) as u32;
        let y = ((ORIGIN_SHIFT - world.y) / span).floor().clamp(0.0, last) as u32;

        Self { z, x, y }
    }

    pub fn from_lon_lat(lon: f64, lat: f64, z: u8) -> Self {
        Self::containing(z, lon_lat_to_mercator(lon, lat))
    }
}

impl Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Affine pixel <-> projected-metre transform of one decoded tile.
///
/// Pixel coordinates are continuous with the origin at the top-left corner of
/// the tile, so the centre of pixel `(col, row)` is `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy)]
pub struct TileGeometry {
    pub key: TileKey,
    pub width: usize,
    pub height: usize,
    forward_matrix: [f64; 6],
    inverse_matrix: [f64; 6],
}

impl TileGeometry {
    pub fn new(key: TileKey, width: usize, height: usize) -> Result<Self> {
        ensure!(key.z <= MAX_ZOOM, "Zoom {} exceeds maximum {}", key.z, MAX_ZOOM);
        ensure!(
            width > 0 && height > 0,
            "Tile {key} has empty pixel dimensions {width}x{height}"
        );

        let bounds = key.bounds();
        let pixel_x = bounds.width() / width as f64;
        let pixel_y = bounds.height() / height as f64;

        let gt = [bounds.min().x, pixel_x, 0.0, bounds.max().y, 0.0, -pixel_y];
        let determinant = gt[1] * gt[5] - gt[2] * gt[4];

        if determinant.abs() < 1e-12 {
            return Err(anyhow!("Degenerate tile transform for {key}"));
        }

        let inv_det = 1.0 / determinant;

        let inverse_matrix = [
            (gt[2] * gt[3] - gt[5] * gt[0]) * inv_det,
            gt[5] * inv_det,
            -gt[2] * inv_det,
            (gt[4] * gt[0] - gt[1] * gt[3]) * inv_det,
            -gt[4] * inv_det,
            gt[1] * inv_det,
        ];

        Ok(Self {
            key,
            width,
            height,
            forward_matrix: gt,
            inverse_matrix,
        })
    }

    pub fn pixel_size_x(&self) -> f64 {
        self.forward_matrix[1]
    }

    pub fn pixel_size_y(&self) -> f64 {
        -self.forward_matrix[5]
    }

    /// Tile width in metres divided by the decoded pixel width.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size_x()
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.key.bounds()
    }

    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> Coord<f64> {
        let fwd = self.forward_matrix;
        let x = fwd[0] + col * fwd[1] + row * fwd[2];
        let y = fwd[3] + col * fwd[4] + row * fwd[5];
        Coord { x, y }
    }

    #[inline]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Coord<f64> {
        let inv = self.inverse_matrix;
        let col = inv[0] + x * inv[1] + y * inv[2];
        let row = inv[3] + x * inv[4] + y * inv[5];
        Coord { x: col, y: row }
    }

    #[inline]
    pub fn pixel_center(&self, col: usize, row: usize) -> Coord<f64> {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }
}
