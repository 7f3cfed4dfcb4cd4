use crate::models::{BoundingBox, Coordinate};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn is_valid_coordinate(coord: Coordinate) -> bool {
    coord.lat.is_finite()
        && coord.lon.is_finite()
        && (-90.0..=90.0).contains(&coord.lat)
        && (-180.0..=180.0).contains(&coord.lon)
}

/// Initial great-circle bearing from one point to another, in degrees within `[0, 360)`.
pub fn bearing(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let lat1 = from_lat.to_radians();
    let lat2 = to_lat.to_radians();
    let dlon = (to_lon - from_lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if degrees >= 360.0 { 0.0 } else { degrees }
}

pub fn bearing_between(from: Coordinate, to: Coordinate) -> f64 {
    bearing(from.lat, from.lon, to.lat, to.lon)
}

/// Sum of the absolute latitude and longitude deltas, in degrees.
pub fn manhattan_distance(a: Coordinate, b: Coordinate) -> f64 {
    (a.lat - b.lat).abs() + (a.lon - b.lon).abs()
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Canonical string of the four edges, used to skip repeated queries for the same viewport.
pub fn bounds_signature(bounds: &BoundingBox) -> String {
    format!(
        "{}-{}-{}-{}",
        bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon
    )
}

pub fn bounds_contains(bounds: &BoundingBox, coord: Coordinate) -> bool {
    coord.lat >= bounds.min_lat
        && coord.lat <= bounds.max_lat
        && coord.lon >= bounds.min_lon
        && coord.lon <= bounds.max_lon
}

/// Smallest box enclosing every point of `path`, `None` for an empty path.
pub fn bounds_of(path: &[Coordinate]) -> Option<BoundingBox> {
    let first = path.first()?;
    let init = BoundingBox {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lon: first.lon,
        max_lon: first.lon,
    };
    Some(path.iter().fold(init, |acc, c| BoundingBox {
        min_lat: acc.min_lat.min(c.lat),
        max_lat: acc.max_lat.max(c.lat),
        min_lon: acc.min_lon.min(c.lon),
        max_lon: acc.max_lon.max(c.lon),
    }))
}
