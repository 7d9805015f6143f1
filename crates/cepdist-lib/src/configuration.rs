//! Adjustable calculator configuration (mode multipliers and output unit).
//!
//! The configuration is a singleton stored as key/value rows. Updates merge
//! the supplied keys into the current mapping, validate the result as a whole
//! and write it in one transaction while holding the database lock, so a
//! concurrent reader sees either the old mapping or the new one in full.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::db::{now_timestamp, Database};
use crate::distance::{DistanceUnit, Multipliers, TravelMode};
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS configurations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub const DIRECT_MULTIPLIER: &str = "direct_multiplier";
pub const WALKING_MULTIPLIER: &str = "walking_multiplier";
pub const DRIVING_MULTIPLIER: &str = "driving_multiplier";
pub const DEFAULT_UNIT: &str = "default_unit";

/// Recognized keys with their human-readable descriptions.
const KEYS: [(&str, &str); 4] = [
    (DIRECT_MULTIPLIER, "Straight-line distance multiplier"),
    (WALKING_MULTIPLIER, "Walking distance multiplier"),
    (DRIVING_MULTIPLIER, "Driving distance multiplier"),
    (DEFAULT_UNIT, "Unit for reported distances (km or mi)"),
];

fn multiplier_key(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Direct => DIRECT_MULTIPLIER,
        TravelMode::Walking => WALKING_MULTIPLIER,
        TravelMode::Driving => DRIVING_MULTIPLIER,
    }
}

/// Current calculator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub multipliers: Multipliers,
    pub unit: DistanceUnit,
    /// Most recent change to any key, if one was ever persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Configuration {
    fn value_of(&self, key: &str) -> String {
        match key {
            DEFAULT_UNIT => self.unit.to_string(),
            _ => TravelMode::ALL
                .into_iter()
                .find(|mode| multiplier_key(*mode) == key)
                .map(|mode| self.multipliers.for_mode(mode).to_string())
                .unwrap_or_default(),
        }
    }

    /// Apply one raw key/value pair. Returns `Ok(false)` for unrecognized keys.
    fn apply(&mut self, key: &str, value: &Value) -> Result<bool> {
        if key == DEFAULT_UNIT {
            let unit = value.as_str().ok_or_else(|| {
                Error::invalid_configuration(format!("{DEFAULT_UNIT} must be a string"))
            })?;
            self.unit = unit.parse()?;
            return Ok(true);
        }

        let Some(mode) = TravelMode::ALL.into_iter().find(|m| multiplier_key(*m) == key) else {
            return Ok(false);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let multiplier = parsed.ok_or_else(|| {
            Error::invalid_configuration(format!("{key} must be a number, got {value}"))
        })?;
        self.multipliers.set(mode, multiplier);
        Ok(true)
    }
}

/// Partial update: recognized keys to their new values.
pub type ConfigurationUpdate = BTreeMap<String, Value>;

/// Outcome of an accepted update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationChange {
    pub updated: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<String>,
    pub configuration: Configuration,
    pub timestamp: String,
}

/// Store for the [`Configuration`] singleton.
#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    db: Database,
}

impl ConfigurationStore {
    /// Wrap `db`, creating the table and seeding defaults for missing keys.
    pub fn new(db: Database) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            let defaults = Configuration::default();
            let now = now_timestamp();
            for (key, name) in KEYS {
                conn.execute(
                    "INSERT OR IGNORE INTO configurations (id, name, value, updated_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![key, name, defaults.value_of(key), now],
                )?;
            }
            Ok(())
        })?;
        Ok(Self { db })
    }

    /// Current configuration; missing or unreadable rows fall back to defaults.
    pub fn get(&self) -> Result<Configuration> {
        self.db.with_connection(|conn| load(conn))
    }

    /// Replace the supplied keys atomically.
    ///
    /// The merged mapping is validated before anything is written; on error
    /// the stored configuration is left untouched.
    pub fn update(&self, update: &ConfigurationUpdate) -> Result<ConfigurationChange> {
        self.db.with_connection(|conn| {
            let tx = conn.transaction()?;
            let mut next = load(&tx)?;
            let mut updated = Vec::new();
            let mut ignored = Vec::new();

            for (key, value) in update {
                if next.apply(key, value)? {
                    updated.push(key.clone());
                } else {
                    ignored.push(key.clone());
                }
            }

            if updated.is_empty() {
                return Err(Error::invalid_configuration(
                    "no recognized configuration key was supplied",
                ));
            }
            next.multipliers.validate()?;

            let now = now_timestamp();
            for key in &updated {
                tx.execute(
                    "UPDATE configurations SET value = ?1, updated_at = ?2 WHERE id = ?3",
                    params![next.value_of(key), now, key],
                )?;
            }
            tx.commit()?;

            next.updated_at = Some(now.clone());
            info!(?updated, ?ignored, "configuration updated");
            Ok(ConfigurationChange {
                updated,
                ignored,
                configuration: next,
                timestamp: now,
            })
        })
    }
}

fn load(conn: &Connection) -> Result<Configuration> {
    let mut stmt = conn.prepare("SELECT id, value, updated_at FROM configurations")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut configuration = Configuration::default();
    for row in rows {
        let (key, value, updated_at) = row?;
        if let Err(err) = configuration.apply(&key, &Value::String(value.clone())) {
            warn!(
                key = %key,
                value = %value,
                error = %err,
                "ignoring unreadable configuration value"
            );
            continue;
        }
        if configuration.updated_at.as_deref() < Some(updated_at.as_str()) {
            configuration.updated_at = Some(updated_at);
        }
    }

    if let Err(err) = configuration.multipliers.validate() {
        warn!(error = %err, "stored multipliers are invalid, using defaults");
        configuration.multipliers = Multipliers::default();
    }
    Ok(configuration)
}
