use crate::core::polygon::PolygonWithId;
use crate::core::spatial::TileKey;
use geo::{BoundingRect, Coord, Intersects, Polygon};
use std::collections::BTreeSet;

fn covering(polygon: &Polygon<f64>, zoom: u8, out: &mut BTreeSet<(u32, u32)>) {
    let Some(rect) = polygon.bounding_rect() else {
        return;
    };

    // Tile rows grow southwards: the first tile holds (min x, max y).
    let first = TileKey::containing(zoom, Coord { x: rect.min().x, y: rect.max().y });
    let last = TileKey::containing(zoom, Coord { x: rect.max().x, y: rect.min().y });

    for y in first.y..=last.y {
        for x in first.x..=last.x {
            if polygon.intersects(&TileKey::new(zoom, x, y).bounds()) {
                out.insert((y, x));
            }
        }
    }
}

/// Every tile at `zoom` touched by a valid polygon, ordered row by row.
pub fn tiles_covering(polygons: &[PolygonWithId], zoom: u8) -> Vec<TileKey> {
    let mut cells = BTreeSet::new();
    for polygon in polygons.iter().filter(|p| p.is_valid()) {
        covering(&polygon.to_mercator(), zoom, &mut cells);
    }
    cells
        .into_iter()
        .map(|(y, x)| TileKey::new(zoom, x, y))
        .collect()
}

/// The polygons whose area reaches into `key`.
pub fn polygons_for_tile(polygons: &[PolygonWithId], key: TileKey) -> Vec<PolygonWithId> {
    let bounds = key.bounds();
    polygons
        .iter()
        .filter(|p| p.is_valid() && p.to_mercator().intersects(&bounds))
        .cloned()
        .collect()
}
