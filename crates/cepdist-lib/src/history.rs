//! Query history kept by the gateway.

use std::fmt;

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{new_id, now_timestamp, Database, Page};
use crate::error::{Error, Resource, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY,
    query_type TEXT NOT NULL,
    query_data TEXT NOT NULL,
    result TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    AddressQuery,
    DistanceCalculation,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::AddressQuery => "address_query",
            QueryType::DistanceCalculation => "distance_calculation",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "address_query" => Some(QueryType::AddressQuery),
            "distance_calculation" => Some(QueryType::DistanceCalculation),
            _ => None,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded query. `query_data` and `result` hold JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query_type: QueryType,
    pub query_data: String,
    pub result: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    pub fn new(db: Database) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }

    /// Append an entry, serializing both payloads as JSON.
    pub fn record<Q, R>(&self, query_type: QueryType, query: &Q, result: &R) -> Result<HistoryEntry>
    where
        Q: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let entry = HistoryEntry {
            id: new_id(),
            query_type,
            query_data: serde_json::to_string(query)?,
            result: serde_json::to_string(result)?,
            created_at: now_timestamp(),
        };
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO history (id, query_type, query_data, result, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    entry.query_type.as_str(),
                    entry.query_data,
                    entry.result,
                    entry.created_at
                ],
            )?;
            Ok(())
        })?;
        Ok(entry)
    }

    pub fn list(&self, page: Page) -> Result<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, query_type, query_data, result, created_at FROM history \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![page.limit, page.offset], read_entry)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.db.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM history WHERE id = ?1", params![id])?)
        })?;
        if removed == 0 {
            return Err(Error::not_found(Resource::HistoryEntry, id));
        }
        Ok(())
    }
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let query_type: String = row.get(1)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        query_type: QueryType::parse(&query_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown query type '{query_type}'").into(),
            )
        })?,
        query_data: row.get(2)?,
        result: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::new(Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn records_json_payloads() {
        let store = store();
        let entry = store
            .record(
                QueryType::AddressQuery,
                "01001000",
                &json!({"localidade": "São Paulo"}),
            )
            .unwrap();
        assert_eq!(entry.query_data, "\"01001000\"");
        let result: serde_json::Value = serde_json::from_str(&entry.result).unwrap();
        assert_eq!(result["localidade"], "São Paulo");
    }

    #[test]
    fn list_is_most_recent_first() {
        let store = store();
        let a = store.record(QueryType::AddressQuery, "a", "x").unwrap();
        let b = store
            .record(QueryType::DistanceCalculation, "b", "y")
            .unwrap();

        let entries = store.list(Page::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, b.id);
        assert_eq!(entries[0].query_type, QueryType::DistanceCalculation);
        assert_eq!(entries[1].id, a.id);
    }

    #[test]
    fn delete_then_delete_again() {
        let store = store();
        let entry = store.record(QueryType::AddressQuery, "a", "x").unwrap();
        store.delete(&entry.id).unwrap();
        assert!(matches!(
            store.delete(&entry.id),
            Err(Error::NotFound {
                resource: Resource::HistoryEntry,
                ..
            })
        ));
    }
}
