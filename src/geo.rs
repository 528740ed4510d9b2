//! Great-circle distance, the last-resort cost when no routed value exists.
//!
//! Less accurate than a routing service (ignores roads) but always available.

use crate::destination::Coord;

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average urban travel speed used to estimate durations.
pub const AVERAGE_SPEED_KMH: f64 = 50.0;

/// Ratio applied to straight-line distance when estimating a road distance.
pub const ROAD_FACTOR: f64 = 1.3;

/// Haversine distance between two coordinates in kilometers.
pub fn haversine_km(from: Coord, to: Coord) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Convert a distance in km to a travel time in minutes at the given speed.
pub fn estimate_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if distance_km <= 0.0 || speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = Coord::new(-7.2575, 112.7521);
        assert!(haversine_km(p, p) < 1e-9, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Surabaya to Jakarta, roughly 660 km in a straight line
        let surabaya = Coord::new(-7.2575, 112.7521);
        let jakarta = Coord::new(-6.2088, 106.8456);
        let dist = haversine_km(surabaya, jakarta);
        assert!(dist > 640.0 && dist < 680.0, "got {}", dist);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = Coord::new(-7.25, 112.75);
        let b = Coord::new(-7.30, 112.70);
        assert_eq!(haversine_km(a, b), haversine_km(b, a));
    }

    #[test]
    fn test_estimate_minutes() {
        // 25 km at 50 km/h = 30 minutes
        assert!((estimate_minutes(25.0, 50.0) - 30.0).abs() < 1e-9);
        assert_eq!(estimate_minutes(0.0, 50.0), 0.0);
    }
}
