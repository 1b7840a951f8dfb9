use crate::core::projection::{ground_scale, mercator_to_lon_lat};
use crate::core::spatial::TileGeometry;
use crate::core::terrain::{ElevationGrid, TerrainTile};
use anyhow::{Context, Result};
use geo::Coord;
use nalgebra::Vector3;
use std::fmt::Display;

/// Decoded terrain plus pixel geometry for one tile.
pub struct TileContext {
    pub geometry: TileGeometry,
    pub terrain: ElevationGrid,
    pub pixel_area_m2: f64,
}

impl TileContext {
    pub fn analyze(tile: &TerrainTile) -> Result<Self> {
        let geometry = TileGeometry::new(tile.key, tile.width, tile.height)?;
        let terrain = ElevationGrid::decode(tile)
            .with_context(|| format!("Failed to decode terrain tile {}", tile.key))?;

        let center = geometry.bounds().center();
        let lat = mercator_to_lon_lat(center.x, center.y).y;
        let scale = ground_scale(lat);
        let pixel_area_m2 =
            geometry.pixel_size_x() * scale * geometry.pixel_size_y() * scale;

        Ok(Self {
            geometry,
            terrain,
            pixel_area_m2,
        })
    }

    #[inline]
    pub fn world_point(&self, col: usize, row: usize) -> Vector3<f64> {
        let Coord { x, y } = self.geometry.pixel_center(col, row);
        let z = self.terrain.elevation[row * self.geometry.width + col] as f64;
        Vector3::new(x, y, z)
    }

    #[inline]
    pub fn surface_normal(&self, col: usize, row: usize) -> Vector3<f64> {
        self.terrain.surface_normal(
            col,
            row,
            self.geometry.pixel_size_x(),
            self.geometry.pixel_size_y(),
        )
    }
}

impl Display for TileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tile {}: {}x{} px, {:.3} m/px, elevation {:.1}m ~ {:.1}m",
            self.geometry.key,
            self.geometry.width,
            self.geometry.height,
            self.geometry.pixel_size(),
            self.terrain.min_elevation,
            self.terrain.max_elevation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spatial::TileKey;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_area_at_equator_matches_pixel_size() {
        let key = TileKey::from_lon_lat(0.001, 0.001, 16);
        let ctx = TileContext::analyze(&TerrainTile::flat(key, 256, 50.0)).unwrap();
        let ps = ctx.geometry.pixel_size();
        assert_relative_eq!(ctx.pixel_area_m2, ps * ps, max_relative = 1e-6);
        assert_relative_eq!(ctx.world_point(3, 4).z, 50.0, epsilon = 0.05);
    }

    #[test]
    fn pixel_area_shrinks_at_high_latitude() {
        let key = TileKey::from_lon_lat(10.0, 60.0, 16);
        let ctx = TileContext::analyze(&TerrainTile::flat(key, 256, 0.0)).unwrap();
        let ps = ctx.geometry.pixel_size();
        assert_relative_eq!(ctx.pixel_area_m2, ps * ps * 0.25, max_relative = 1e-3);
    }
}
