use geo::Point;

/// Earth's radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Miles per kilometer
pub const MILES_PER_KM: f64 = 0.621371;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    // Rounding can push `a` just past 1.0 for antipodal points
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Haversine distance between two points in miles
#[inline]
pub fn haversine_distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    km_to_miles(haversine_distance(lat1, lon1, lat2, lon2))
}

/// Distance in kilometers between two `geo` points (x = longitude, y = latitude)
#[inline]
pub fn point_distance_km(a: &Point<f64>, b: &Point<f64>) -> f64 {
    haversine_distance(a.y(), a.x(), b.y(), b.x())
}

#[inline]
pub fn km_to_miles(km: f64) -> f64 {
    km * MILES_PER_KM
}

/// Build a point from decimal-degree latitude/longitude, rejecting values
/// that are not finite or fall outside the valid ranges.
pub fn checked_point(latitude: f64, longitude: f64) -> Option<Point<f64>> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Point::new(longitude, latitude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::HaversineDistance;

    #[test]
    fn test_haversine_distance() {
        // Distance from London to Paris (approximately 344 km)
        let london_lat = 51.5074;
        let london_lon = -0.1278;
        let paris_lat = 48.8566;
        let paris_lon = 2.3522;

        let distance = haversine_distance(london_lat, london_lon, paris_lat, paris_lon);
        assert!((distance - 344.0).abs() < 10.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_coincident_points() {
        assert_eq!(haversine_distance(39.65, -104.90, 39.65, -104.90), 0.0);
    }

    #[test]
    fn test_antipodal_points_are_finite() {
        let distance = haversine_distance(0.0, 0.0, 0.0, 180.0);
        assert!(distance.is_finite());
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((distance - half_circumference).abs() < 1e-6);
    }

    #[test]
    fn test_miles_conversion() {
        let km = haversine_distance(39.7392, -104.9903, 39.5807, -104.8772);
        let miles = haversine_distance_miles(39.7392, -104.9903, 39.5807, -104.8772);
        assert!((miles - km * 0.621371).abs() < 1e-9);
    }

    #[test]
    fn test_agrees_with_geo_crate() {
        // geo uses a slightly larger mean radius (6371.0088 km)
        let a = Point::new(-104.9903, 39.7392);
        let b = Point::new(-104.8772, 39.5807);
        let ours = point_distance_km(&a, &b);
        let theirs = a.haversine_distance(&b) / 1000.0;
        assert!((ours - theirs).abs() < 0.01, "ours={} geo={}", ours, theirs);
    }

    #[test]
    fn test_checked_point() {
        let p = checked_point(39.65, -104.90).unwrap();
        assert_eq!(p.x(), -104.90);
        assert_eq!(p.y(), 39.65);

        assert!(checked_point(f64::NAN, 0.0).is_none());
        assert!(checked_point(91.0, 0.0).is_none());
        assert!(checked_point(0.0, -181.0).is_none());
    }
}
