//! Street addresses and coordinate resolution.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Coordinates;

/// Address submitted for a calculation, optionally carrying coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub state: String,
    /// Street line (street, neighbourhood).
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Address {
    pub fn new(
        city: impl Into<String>,
        state: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            address: address.into(),
            latitude: None,
            longitude: None,
        }
    }

    /// Attach explicit coordinates; they take precedence over geocoding.
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Resolve the coordinates of this address.
    ///
    /// Supplied coordinates are validated and used as-is; a lone latitude or
    /// longitude is rejected. Otherwise the geocoder is consulted.
    pub fn resolve(&self, geocoder: &dyn Geocoder) -> Result<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude),
            (Some(latitude), None) => Err(Error::InvalidCoordinate {
                field: "longitude",
                value: format!("missing (latitude = {latitude})"),
                range: "[-180, 180]",
            }),
            (None, Some(longitude)) => Err(Error::InvalidCoordinate {
                field: "latitude",
                value: format!("missing (longitude = {longitude})"),
                range: "[-90, 90]",
            }),
            (None, None) => geocoder.geocode(self),
        }
    }

    /// Copy of this address with the resolved coordinates filled in.
    pub fn resolved(&self, coordinates: Coordinates) -> Self {
        Self {
            latitude: Some(coordinates.latitude),
            longitude: Some(coordinates.longitude),
            ..self.clone()
        }
    }
}

/// Turns an address into coordinates.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &Address) -> Result<Coordinates>;
}

/// Deterministic offline geocoder.
///
/// Derives a position inside a box over South America from code-point sums of
/// the city, state and street. It is stable across runs, which keeps
/// calculations reproducible without an external geocoding service.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGeocoder;

impl HashGeocoder {
    fn code_point_sum(value: &str) -> u64 {
        value.to_lowercase().chars().map(|c| u64::from(u32::from(c))).sum()
    }
}

impl Geocoder for HashGeocoder {
    fn geocode(&self, address: &Address) -> Result<Coordinates> {
        let city = Self::code_point_sum(&address.city);
        let state = Self::code_point_sum(&address.state);
        let street = Self::code_point_sum(&address.address);

        let variation = (street % 100) as f64 / 1000.0;
        let latitude = -30.0 + (city % 25) as f64 + variation;
        let longitude = -70.0 + (state % 35) as f64 + variation;

        Coordinates::new(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_coordinates_win() {
        let address =
            Address::new("São Paulo", "SP", "Praça da Sé").with_coordinates(-23.5505, -46.6333);
        let coords = address.resolve(&HashGeocoder).unwrap();
        assert_eq!(coords.latitude, -23.5505);
        assert_eq!(coords.longitude, -46.6333);
    }

    #[test]
    fn lone_latitude_is_rejected() {
        let mut address = Address::new("Recife", "PE", "Rua da Aurora");
        address.latitude = Some(-8.05);
        assert!(matches!(
            address.resolve(&HashGeocoder),
            Err(Error::InvalidCoordinate {
                field: "longitude",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_explicit_coordinates_are_rejected() {
        let address = Address::new("X", "Y", "Z").with_coordinates(-123.0, 0.0);
        assert!(address.resolve(&HashGeocoder).is_err());
    }

    #[test]
    fn hash_geocoder_is_deterministic() {
        let address = Address::new("São Paulo", "SP", "Praça da Sé, Sé");
        let first = HashGeocoder.geocode(&address).unwrap();
        let second = HashGeocoder.geocode(&address).unwrap();
        assert_eq!(first, second);
        assert!((first.latitude - -24.916).abs() < 1e-9);
        assert!((first.longitude - -52.916).abs() < 1e-9);
    }

    #[test]
    fn hash_geocoder_ignores_case() {
        let upper = HashGeocoder.geocode(&Address::new("RECIFE", "PE", "RUA")).unwrap();
        let lower = HashGeocoder.geocode(&Address::new("recife", "pe", "rua")).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn resolved_fills_coordinates() {
        let address = Address::new("Natal", "RN", "Av. Roberto Freire");
        let coords = Coordinates::new(-5.79, -35.2).unwrap();
        let resolved = address.resolved(coords);
        assert_eq!(resolved.latitude, Some(-5.79));
        assert_eq!(resolved.longitude, Some(-35.2));
        assert_eq!(resolved.city, "Natal");
    }
}
