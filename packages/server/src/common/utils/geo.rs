use crate::common::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
///
/// Haversine formula in the `atan2(√a, √(1−a))` form. It agrees with the
/// spherical law of cosines to floating-point tolerance and, unlike `acos`
/// near 1, keeps full precision at the few-metre separations responders
/// are ranked by. Pure and always available: every distance-dependent
/// decision falls back to it when the route provider is down.
///
/// # Example
/// ```
/// use dispatch_core::common::utils::haversine_distance;
///
/// // One degree of latitude is ~111.2 km
/// let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
/// assert!((d - 111_195.0).abs() < 100.0);
/// ```
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Haversine distance between two points.
pub fn distance_between(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}
