use crate::model::{BoundingRegion, Coordinate};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Circle around the lat/lon box of `coords`: centered on the box, radius
/// half the NE-SW diagonal. Not the optimal enclosing circle. Boxes that
/// straddle the antimeridian are not unwrapped.
pub fn compute_bounds(coords: &[Coordinate]) -> Option<BoundingRegion> {
    let first = coords.first()?;
    let mut min_lat = first.latitude;
    let mut max_lat = first.latitude;
    let mut min_lon = first.longitude;
    let mut max_lon = first.longitude;
    for c in &coords[1..] {
        min_lat = min_lat.min(c.latitude);
        max_lat = max_lat.max(c.latitude);
        min_lon = min_lon.min(c.longitude);
        max_lon = max_lon.max(c.longitude);
    }

    let center = Coordinate::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0);
    let diagonal = haversine_m(max_lat, max_lon, min_lat, min_lon);
    Some(BoundingRegion {
        center,
        radius_meters: diagonal / 2.0,
    })
}

pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}
