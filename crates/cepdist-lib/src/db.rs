use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Shared handle to the service's SQLite database.
///
/// All access is serialized through a single mutex-guarded connection, which
/// is also what makes multi-row writes atomic with respect to readers.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening database");
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(connection: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(connection)),
        }
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Cheap connectivity probe for readiness checks.
    pub fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Poisoning is recovered; multi-row writes run inside transactions.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Window over a most-recent-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// Timestamp format used for every persisted `created_at`/`updated_at` column.
///
/// Fixed precision keeps lexical order equal to chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in the persisted timestamp format.
pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Parse a persisted timestamp.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// New server-assigned identifier (UUID v7, time-ordered).
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_answers_ping() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ping().is_ok());
    }

    #[test]
    fn file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cepdist.db");
        let db = Database::open(&path).unwrap();
        db.ping().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn timestamps_round_trip_and_sort() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        let (a, b) = (timestamp(earlier), timestamp(later));
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).map(timestamp), Some(a));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
