use geo::Coord;
use std::f64::consts::PI;

pub const EARTH_RADIUS: f64 = 6378137.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;
pub const WORLD_SIZE: f64 = 2.0 * ORIGIN_SHIFT;

/// Spherical web-Mercator forward projection, degrees to projected metres.
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> Coord<f64> {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;

    Coord { x, y }
}

pub fn mercator_to_lon_lat(x: f64, y: f64) -> Coord<f64> {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();

    Coord { x: lon, y: lat }
}

/// Ground metres per projected metre at the given latitude.
pub fn ground_scale(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians().cos()
}
