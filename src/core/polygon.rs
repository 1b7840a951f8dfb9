use crate::core::projection::lon_lat_to_mercator;
use crate::core::spatial::TileGeometry;
use geo::{Coord, LineString, Polygon};

/// A ground polygon of interest: a closed ring of (longitude, latitude).
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonWithId {
    pub id: String,
    pub ring: LineString<f64>,
}

impl PolygonWithId {
    pub fn new(id: impl Into<String>, ring: impl Into<LineString<f64>>) -> Self {
        Self {
            id: id.into(),
            ring: ring.into(),
        }
    }

    /// Uses `polygon-{index}` when the source supplied no identifier.
    pub fn with_index(id: Option<String>, ring: impl Into<LineString<f64>>, index: usize) -> Self {
        Self::new(id.unwrap_or_else(|| format!("polygon-{index}")), ring)
    }

    /// Ring vertices without the closing duplicate.
    pub fn vertices(&self) -> &[Coord<f64>] {
        let coords = self.ring.0.as_slice();
        match (coords.first(), coords.last()) {
            (Some(first), Some(last)) if coords.len() > 1 && first == last => {
                &coords[..coords.len() - 1]
            }
            _ => coords,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.vertices().len() >= 3
    }

    pub fn to_mercator(&self) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = self
            .vertices()
            .iter()
            .map(|c| lon_lat_to_mercator(c.x, c.y))
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    pub fn to_pixel_ring(&self, geometry: &TileGeometry) -> Vec<Coord<f64>> {
        self.vertices()
            .iter()
            .map(|c| {
                let m = lon_lat_to_mercator(c.x, c.y);
                geometry.world_to_pixel(m.x, m.y)
            })
            .collect()
    }
}
