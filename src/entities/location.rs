use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

/// WGS84 coordinate pair, latitude/longitude in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<Coordinates> for Geometry<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.longitude, coordinates.latitude).into()
    }
}

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_meters(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_between_kinshasa_points() {
        // pickup/dropoff pair roughly 1.57km apart
        let pickup = Coordinates::new(-4.3276, 15.3156);
        let dropoff = Coordinates::new(-4.3376, 15.3256);

        let meters = haversine_meters(&pickup, &dropoff);

        assert!(meters > 1500.0 && meters < 1650.0, "got {}", meters);
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Coordinates::new(-4.3276, 15.3156);
        let b = Coordinates::new(-4.3180, 15.3000);

        assert_eq!(haversine_meters(&a, &a), 0.0);

        let ab = haversine_meters(&a, &b);
        let ba = haversine_meters(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_at_equator() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);

        let meters = haversine_meters(&a, &b);

        assert!((meters - 111_195.0).abs() < 100.0, "got {}", meters);
    }

    #[test]
    fn coordinate_validation() {
        assert!(Coordinates::new(-4.3276, 15.3156).is_valid());
        assert!(!Coordinates::new(91.0, 15.3156).is_valid());
        assert!(!Coordinates::new(-4.3276, 181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 15.3156).is_valid());
    }
}
