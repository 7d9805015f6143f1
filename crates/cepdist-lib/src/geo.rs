//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius used by the Haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build a coordinate pair, rejecting values outside [-90, 90] / [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidCoordinate {
                field: "latitude",
                value: latitude.to_string(),
                range: "[-90, 90]",
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidCoordinate {
                field: "longitude",
                value: longitude.to_string(),
                range: "[-180, 180]",
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to another point in kilometres.
    pub fn distance_to(&self, other: &Self) -> f64 {
        haversine_km(self, other)
    }
}

/// Great-circle distance between two points using the Haversine formula.
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_latitude_out_of_range() {
        let err = Coordinates::new(90.5, 0.0).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCoordinate {
                field: "latitude",
                ..
            }
        ));
    }

    #[test]
    fn rejects_longitude_out_of_range() {
        let err = Coordinates::new(0.0, -180.01).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCoordinate {
                field: "longitude",
                ..
            }
        ));
    }

    #[test]
    fn rejects_nan() {
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_boundaries() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(0.0, 1.0).unwrap();
        assert!((haversine_km(&a, &b) - 111.19).abs() < 0.01);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(0.0, 180.0).unwrap();
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((a.distance_to(&b) - expected).abs() < 1e-6);
    }
}
