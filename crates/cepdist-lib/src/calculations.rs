//! Persisted history of distance calculations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::Address;
use crate::db::{new_id, now_timestamp, Database, Page};
use crate::distance::{DistanceUnit, TravelMode};
use crate::error::{Error, Resource, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calculations (
    id TEXT PRIMARY KEY,
    origin_city TEXT NOT NULL,
    origin_state TEXT NOT NULL,
    origin_address TEXT NOT NULL,
    origin_latitude REAL,
    origin_longitude REAL,
    destination_city TEXT NOT NULL,
    destination_state TEXT NOT NULL,
    destination_address TEXT NOT NULL,
    destination_latitude REAL,
    destination_longitude REAL,
    mode TEXT NOT NULL,
    distance REAL NOT NULL,
    unit TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS calculations_created_at ON calculations (created_at);
";

const COLUMNS: &str = "id, origin_city, origin_state, origin_address, origin_latitude, \
     origin_longitude, destination_city, destination_state, destination_address, \
     destination_latitude, destination_longitude, mode, distance, unit, created_at";

/// A stored calculation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub id: String,
    pub origin: Address,
    pub destination: Address,
    pub mode: TravelMode,
    pub distance: f64,
    pub unit: DistanceUnit,
    pub created_at: String,
}

/// Inputs of a calculation before the store assigns its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalculation {
    pub origin: Address,
    pub destination: Address,
    pub mode: TravelMode,
    pub distance: f64,
    pub unit: DistanceUnit,
}

/// Store for [`CalculationRecord`]s.
#[derive(Debug, Clone)]
pub struct CalculationStore {
    db: Database,
}

impl CalculationStore {
    /// Wrap `db`, creating the table if needed.
    pub fn new(db: Database) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }

    /// Persist a calculation under a fresh server-assigned id.
    pub fn create(&self, calculation: NewCalculation) -> Result<CalculationRecord> {
        let record = CalculationRecord {
            id: new_id(),
            origin: calculation.origin,
            destination: calculation.destination,
            mode: calculation.mode,
            distance: calculation.distance,
            unit: calculation.unit,
            created_at: now_timestamp(),
        };

        self.db.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO calculations ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    record.id,
                    record.origin.city,
                    record.origin.state,
                    record.origin.address,
                    record.origin.latitude,
                    record.origin.longitude,
                    record.destination.city,
                    record.destination.state,
                    record.destination.address,
                    record.destination.latitude,
                    record.destination.longitude,
                    record.mode.as_str(),
                    record.distance,
                    record.unit.as_str(),
                    record.created_at,
                ],
            )?;
            Ok(())
        })?;

        debug!(
            id = %record.id,
            mode = %record.mode,
            distance = record.distance,
            "calculation stored"
        );
        Ok(record)
    }

    /// Most-recent-first listing; insertion order breaks timestamp ties.
    pub fn list(&self, page: Page) -> Result<Vec<CalculationRecord>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM calculations \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![page.limit, page.offset], read_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
        })
    }

    pub fn get(&self, id: &str) -> Result<CalculationRecord> {
        self.db
            .with_connection(|conn| find(conn, id))?
            .ok_or_else(|| Error::not_found(Resource::Calculation, id))
    }

    /// Remove a calculation. Fails with `NotFound` when `id` is unknown.
    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.db.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM calculations WHERE id = ?1", params![id])?)
        })?;
        if removed == 0 {
            return Err(Error::not_found(Resource::Calculation, id));
        }
        debug!(id, "calculation deleted");
        Ok(())
    }
}

fn find(conn: &Connection, id: &str) -> Result<Option<CalculationRecord>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM calculations WHERE id = ?1"),
            params![id],
            read_record,
        )
        .optional()?)
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<CalculationRecord> {
    let mode: String = row.get("mode")?;
    let unit: String = row.get("unit")?;
    Ok(CalculationRecord {
        id: row.get("id")?,
        origin: Address {
            city: row.get("origin_city")?,
            state: row.get("origin_state")?,
            address: row.get("origin_address")?,
            latitude: row.get("origin_latitude")?,
            longitude: row.get("origin_longitude")?,
        },
        destination: Address {
            city: row.get("destination_city")?,
            state: row.get("destination_state")?,
            address: row.get("destination_address")?,
            latitude: row.get("destination_latitude")?,
            longitude: row.get("destination_longitude")?,
        },
        mode: mode.parse().map_err(|e| conversion_error(11, e))?,
        distance: row.get("distance")?,
        unit: unit.parse().map_err(|e| conversion_error(13, e))?,
        created_at: row.get("created_at")?,
    })
}

fn conversion_error(column: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
