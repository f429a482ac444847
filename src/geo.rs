//! Great-circle distance on the GPS coordinates used throughout the crate.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two WGS84 coordinates.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lng2 - lng1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    // One degree of latitude on a 6371 km sphere.
    const METERS_PER_DEGREE_LAT: f64 = 111_194.926;

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(haversine_m(59.32931, 18.0363, 59.32931, 18.0363), 0.0);
    }

    #[test]
    fn known_1000m_pair_within_tolerance() {
        let d = haversine_m(59.0, 18.0, 59.0 + 1000.0 / METERS_PER_DEGREE_LAT, 18.0);
        assert!((d - 1000.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_m(59.32931, 18.0363, 59.40300, 18.35100);
        let b = haversine_m(59.40300, 18.35100, 59.32931, 18.0363);
        assert!((a - b).abs() < 1e-9);
    }
}
