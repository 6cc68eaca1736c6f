use walkie_lib::position::Position;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two `(latitude, longitude)` pairs in degrees.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let d_lat = (p2.0 - p1.0).to_radians();
    let d_lon = (p2.1 - p1.1).to_radians();
    let lat1 = p1.0.to_radians();
    let lat2 = p2.0.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::atan2(a.sqrt(), (1. - a).sqrt());

    EARTH_RADIUS_M * c
}

pub fn distance_between(from: &Position, to: &Position) -> f64 {
    haversine_distance((from.latitude, from.longitude), (to.latitude, to.longitude))
}

/// Sum of the distances between consecutive points.
pub fn route_length(route: &[Position]) -> f64 {
    route.windows(2).map(|pair| distance_between(&pair[0], &pair[1])).sum()
}
