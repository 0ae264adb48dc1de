//! Great-circle distance helpers used by the geofence and route checks.
//!
//! Coordinates are WGS84 degrees. Nothing here validates its input: NaN or
//! out-of-range coordinates produce meaningless distances and are the
//! caller's problem.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two lat/lng points.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// True when the current position lies within `radius` meters of the target (inclusive).
pub fn is_within_range(
    cur_lat: f64,
    cur_lng: f64,
    target_lat: f64,
    target_lng: f64,
    radius: f64,
) -> bool {
    distance_meters(cur_lat, cur_lng, target_lat, target_lng) <= radius
}

/// Smallest distance from a position to any vertex of a polyline.
///
/// Returns `None` for an empty polyline. Only vertices are considered, so a
/// position halfway along a long straight leg reads further away than it is.
pub fn nearest_vertex_distance<I>(lat: f64, lng: f64, vertices: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    vertices
        .into_iter()
        .map(|(v_lat, v_lng)| distance_meters(lat, lng, v_lat, v_lng))
        .fold(None, |min, d| match min {
            Some(m) if m <= d => Some(m),
            _ => Some(d),
        })
}

/// Latitude offset in degrees for a northward displacement of `meters`.
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_METERS).to_degrees()
}
