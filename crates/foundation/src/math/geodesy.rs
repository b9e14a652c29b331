use super::LatLon;

/// Mean Earth radius (kilometers) for the spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometers (haversine on a sphere).
///
/// Symmetric in its arguments and exactly zero for identical points.
pub fn haversine_km(a: LatLon, b: LatLon) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let half_dlat = (b.lat - a.lat).to_radians() * 0.5;
    let half_dlon = (b.lon - a.lon).to_radians() * 0.5;

    let sin_dlat = half_dlat.sin();
    let sin_dlon = half_dlon.sin();
    let h = sin_dlat * sin_dlat + lat_a.cos() * lat_b.cos() * sin_dlon * sin_dlon;

    // Rounding can push `h` marginally past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::{EARTH_RADIUS_KM, haversine_km};
    use crate::math::LatLon;
    use proptest::prelude::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn same_point_is_zero() {
        let p = LatLon::new(40.7, -74.0);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn new_york_to_london() {
        let nyc = LatLon::new(40.7128, -74.0060);
        let lon = LatLon::new(51.5074, -0.1278);
        assert_close(haversine_km(nyc, lon), 5570.0, 10.0);
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let a = LatLon::new(0.0, 0.0);
        let b = LatLon::new(0.0, 180.0);
        assert_close(haversine_km(a, b), std::f64::consts::PI * EARTH_RADIUS_KM, 1e-6);
    }

    fn lat() -> impl Strategy<Value = f64> {
        -90.0f64..=90.0
    }

    fn lon() -> impl Strategy<Value = f64> {
        -180.0f64..=180.0
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a_lat in lat(), a_lon in lon(), b_lat in lat(), b_lon in lon()) {
            let a = LatLon::new(a_lat, a_lon);
            let b = LatLon::new(b_lat, b_lon);
            let ab = haversine_km(a, b);
            let ba = haversine_km(b, a);
            prop_assert!((ab - ba).abs() <= 1e-9, "{ab} != {ba}");
        }

        #[test]
        fn distance_to_self_is_zero(p_lat in lat(), p_lon in lon()) {
            let p = LatLon::new(p_lat, p_lon);
            prop_assert_eq!(haversine_km(p, p), 0.0);
        }
    }
}
