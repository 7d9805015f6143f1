use std::sync::Arc;

use tracing::debug;

use crate::address::{Address, Geocoder, HashGeocoder};
use crate::calculations::{CalculationRecord, CalculationStore, NewCalculation};
use crate::configuration::ConfigurationStore;
use crate::db::Database;
use crate::distance::{calculate_distance, round_distance, TravelMode};
use crate::error::Result;

/// Resolves addresses, applies the distance engine and records the outcome.
#[derive(Clone)]
pub struct Calculator {
    geocoder: Arc<dyn Geocoder>,
    configuration: ConfigurationStore,
    calculations: CalculationStore,
}

impl Calculator {
    /// Calculator backed by `db` with the deterministic [`HashGeocoder`].
    pub fn new(db: Database) -> Result<Self> {
        Self::with_geocoder(db, Arc::new(HashGeocoder))
    }

    pub fn with_geocoder(db: Database, geocoder: Arc<dyn Geocoder>) -> Result<Self> {
        Ok(Self {
            geocoder,
            configuration: ConfigurationStore::new(db.clone())?,
            calculations: CalculationStore::new(db)?,
        })
    }

    pub fn configuration(&self) -> &ConfigurationStore {
        &self.configuration
    }

    pub fn calculations(&self) -> &CalculationStore {
        &self.calculations
    }

    /// Compute and persist the distance between two addresses.
    ///
    /// Nothing is stored when coordinate resolution fails.
    pub fn calculate(
        &self,
        origin: &Address,
        destination: &Address,
        mode: TravelMode,
    ) -> Result<CalculationRecord> {
        let from = origin.resolve(self.geocoder.as_ref())?;
        let to = destination.resolve(self.geocoder.as_ref())?;

        let configuration = self.configuration.get()?;
        let km = calculate_distance(&from, &to, mode, &configuration.multipliers)?;
        let distance = round_distance(configuration.unit.from_km(km));
        debug!(%mode, km, distance, unit = %configuration.unit, "distance calculated");

        self.calculations.create(NewCalculation {
            origin: origin.resolved(from),
            destination: destination.resolved(to),
            mode,
            distance,
            unit: configuration.unit,
        })
    }
}

impl std::fmt::Debug for Calculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calculator")
            .field("configuration", &self.configuration)
            .field("calculations", &self.calculations)
            .finish_non_exhaustive()
    }
}
