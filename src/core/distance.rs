use crate::models::{BoundingBox, GeoPoint};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two points in kilometers
#[inline]
pub fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two optional locations; `None` when either is unknown
#[inline]
pub fn distance_between(from: Option<GeoPoint>, to: Option<GeoPoint>) -> Option<f64> {
    match (from, to) {
        (Some(from), Some(to)) => Some(haversine_distance(from, to)),
        _ => None,
    }
}

/// Box around a center point, used to narrow the candidate pool query
///
/// 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude)
pub fn calculate_bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let cos_lat = center.latitude.to_radians().cos().abs();
    // Near the poles every longitude is within reach
    let lon_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
    };

    BoundingBox {
        min_lat: (center.latitude - lat_delta).max(-90.0),
        max_lat: (center.latitude + lat_delta).min(90.0),
        min_lon: center.longitude - lon_delta,
        max_lon: center.longitude + lon_delta,
    }
}

#[inline]
pub fn is_within_bounding_box(point: GeoPoint, bbox: &BoundingBox) -> bool {
    point.latitude >= bbox.min_lat
        && point.latitude <= bbox.max_lat
        && point.longitude >= bbox.min_lon
        && point.longitude <= bbox.max_lon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint { latitude, longitude }
    }

    #[test]
    fn test_haversine_distance() {
        // London to Paris is roughly 344 km
        let distance = haversine_distance(point(51.5074, -0.1278), point(48.8566, 2.3522));
        assert!((distance - 344.0).abs() < 10.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_distance_unknown_location() {
        assert_eq!(distance_between(Some(point(1.0, 1.0)), None), None);
        assert_eq!(distance_between(None, None), None);
        assert!(distance_between(Some(point(1.0, 1.0)), Some(point(1.0, 1.0))).unwrap() < 0.01);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(point(40.7128, -74.0060), 10.0);

        assert!(bbox.min_lat < 40.7128);
        assert!(bbox.max_lat > 40.7128);
        assert!(bbox.min_lon < -74.0060);
        assert!(bbox.max_lon > -74.0060);

        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.18).abs() < 0.02, "Lat span should be ~0.18 degrees");
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(point(40.7128, -74.0060), 10.0);

        assert!(is_within_bounding_box(point(40.7128, -74.0060), &bbox));
        assert!(is_within_bounding_box(point(40.71, -74.0), &bbox));
        assert!(!is_within_bounding_box(point(50.0, -80.0), &bbox));
    }
}
