//! cepdist library entry points.
//!
//! This crate holds everything the two HTTP services share beyond HTTP glue:
//! the Haversine distance engine and travel-mode multipliers, address
//! geocoding, the SQLite-backed stores (calculations, configuration, history,
//! users, CEP cache), and the ViaCEP client. Services should call the
//! functions exported here instead of reimplementing behavior.

#![deny(warnings)]

pub mod address;
pub mod calculations;
pub mod calculator;
pub mod configuration;
pub mod db;
pub mod distance;
pub mod error;
pub mod geo;
pub mod history;
pub mod postal;
pub mod users;

pub use address::{Address, Geocoder, HashGeocoder};
pub use calculations::{CalculationRecord, CalculationStore, NewCalculation};
pub use calculator::Calculator;
pub use configuration::{
    Configuration, ConfigurationChange, ConfigurationStore, ConfigurationUpdate,
};
pub use db::{Database, Page};
pub use distance::{calculate_distance, DistanceUnit, Multipliers, TravelMode};
pub use error::{Error, Resource, Result};
pub use geo::{haversine_km, Coordinates, EARTH_RADIUS_KM};
pub use history::{HistoryEntry, HistoryStore, QueryType};
pub use postal::{
    normalize_cep, AddressCache, LookupSource, PostalAddress, PostalLookup, PostalService,
    ViaCepClient,
};
pub use users::{NewUser, User, UserStore, UserUpdate};
