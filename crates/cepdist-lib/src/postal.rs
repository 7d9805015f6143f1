//! CEP (Brazilian postal code) lookup through ViaCEP, with a local cache.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::db::{now_timestamp, parse_timestamp, Database};
use crate::error::{Error, Resource, Result};

/// Name used for ViaCEP in errors, logs and metrics.
pub const VIACEP: &str = "viacep";

pub const DEFAULT_VIACEP_BASE_URL: &str = "https://viacep.com.br";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS addresses (
    cep TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
";

/// Address as returned by ViaCEP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub cep: String,
    #[serde(default)]
    pub logradouro: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complemento: Option<String>,
    #[serde(default)]
    pub bairro: String,
    pub localidade: String,
    pub uf: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siafi: Option<String>,
}

impl PostalAddress {
    /// Calculator address: city, state and "street, neighbourhood".
    pub fn to_address(&self) -> Address {
        let street = match (self.logradouro.is_empty(), self.bairro.is_empty()) {
            (false, false) => format!("{}, {}", self.logradouro, self.bairro),
            (false, true) => self.logradouro.clone(),
            (true, _) => self.bairro.clone(),
        };
        Address::new(self.localidade.clone(), self.uf.clone(), street)
    }
}

/// Strip everything but digits; the result must be exactly eight digits.
pub fn normalize_cep(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 8 {
        return Err(Error::InvalidPostalCode {
            cep: raw.to_string(),
        });
    }
    Ok(digits)
}

/// HTTP client for the ViaCEP API.
#[derive(Debug, Clone)]
pub struct ViaCepClient {
    http: Client,
    base_url: String,
}

impl ViaCepClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    /// Reuse an existing `reqwest` client (its timeout applies).
    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the address for a normalized CEP.
    pub async fn lookup(&self, cep: &str) -> Result<PostalAddress> {
        let url = format!("{}/ws/{}/json/", self.base_url, cep);
        debug!(%url, "querying ViaCEP");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::from_upstream(VIACEP, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(cep, status = status.as_u16(), "ViaCEP returned an error status");
            return Err(Error::UpstreamUnavailable {
                upstream: VIACEP,
                message: format!("unexpected status {status}"),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::from_upstream(VIACEP, e))?;

        // Unknown codes come back as 200 with {"erro": true} (or "true").
        let missing = match body.get("erro") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag == "true",
            _ => false,
        };
        if missing {
            return Err(Error::not_found(Resource::PostalCode, cep));
        }

        serde_json::from_value(body).map_err(|e| Error::UpstreamUnavailable {
            upstream: VIACEP,
            message: format!("malformed response: {e}"),
        })
    }
}

/// Locally cached ViaCEP answers keyed by normalized CEP.
#[derive(Debug, Clone)]
pub struct AddressCache {
    db: Database,
}

impl AddressCache {
    pub fn new(db: Database) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }

    /// Cached entry for `cep` if it was refreshed less than `ttl` ago.
    pub fn get_fresh(&self, cep: &str, ttl: chrono::Duration) -> Result<Option<PostalAddress>> {
        let row: Option<(String, String)> = self.db.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT address, last_updated FROM addresses WHERE cep = ?1",
                    params![cep],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        let Some((address, last_updated)) = row else {
            return Ok(None);
        };
        let fresh = parse_timestamp(&last_updated)
            .map(|at| Utc::now() - at < ttl)
            .unwrap_or(false);
        if !fresh {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&address)?))
    }

    pub fn put(&self, cep: &str, address: &PostalAddress) -> Result<()> {
        let payload = serde_json::to_string(address)?;
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO addresses (cep, address, last_updated) VALUES (?1, ?2, ?3)",
                params![cep, payload, now_timestamp()],
            )?;
            Ok(())
        })
    }
}

/// Where a lookup was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    Cache,
    Upstream,
}

impl LookupSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupSource::Cache => "cache",
            LookupSource::Upstream => "upstream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostalLookup {
    pub cep: String,
    pub address: PostalAddress,
    pub source: LookupSource,
}

/// Cache-first CEP resolution.
#[derive(Debug, Clone)]
pub struct PostalService {
    client: ViaCepClient,
    cache: AddressCache,
    ttl: chrono::Duration,
}

impl PostalService {
    pub const DEFAULT_TTL_DAYS: i64 = 30;

    pub fn new(client: ViaCepClient, cache: AddressCache, ttl: chrono::Duration) -> Self {
        Self { client, cache, ttl }
    }

    /// Resolve a raw CEP, serving fresh cache entries without calling ViaCEP.
    ///
    /// Upstream answers are written back to the cache.
    pub async fn lookup(&self, raw_cep: &str) -> Result<PostalLookup> {
        let cep = normalize_cep(raw_cep)?;

        if let Some(address) = self.cache.get_fresh(&cep, self.ttl)? {
            debug!(%cep, "serving CEP from cache");
            return Ok(PostalLookup {
                cep,
                address,
                source: LookupSource::Cache,
            });
        }

        let address = self.client.lookup(&cep).await?;
        self.cache.put(&cep, &address)?;
        info!(%cep, city = %address.localidade, "CEP resolved upstream");
        Ok(PostalLookup {
            cep,
            address,
            source: LookupSource::Upstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn se() -> PostalAddress {
        PostalAddress {
            cep: "01001-000".to_string(),
            logradouro: "Praça da Sé".to_string(),
            complemento: Some("lado ímpar".to_string()),
            bairro: "Sé".to_string(),
            localidade: "São Paulo".to_string(),
            uf: "SP".to_string(),
            ibge: Some("3550308".to_string()),
            gia: Some("1004".to_string()),
            ddd: Some("11".to_string()),
            siafi: Some("7107".to_string()),
        }
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_cep("01001-000").unwrap(), "01001000");
        assert_eq!(normalize_cep(" 01.001-000 ").unwrap(), "01001000");
    }

    #[test]
    fn normalize_rejects_wrong_length() {
        assert!(matches!(
            normalize_cep("1234-567"),
            Err(Error::InvalidPostalCode { .. })
        ));
        assert!(normalize_cep("010010001").is_err());
        assert!(normalize_cep("").is_err());
    }

    #[test]
    fn to_address_joins_street_and_neighbourhood() {
        let address = se().to_address();
        assert_eq!(address.city, "São Paulo");
        assert_eq!(address.state, "SP");
        assert_eq!(address.address, "Praça da Sé, Sé");
    }

    #[test]
    fn viacep_payload_deserializes_with_extra_fields() {
        let json = r#"{"cep":"01001-000","logradouro":"Praça da Sé","complemento":"lado ímpar",
            "unidade":"","bairro":"Sé","localidade":"São Paulo","uf":"SP","estado":"São Paulo",
            "regiao":"Sudeste","ibge":"3550308","gia":"1004","ddd":"11","siafi":"7107"}"#;
        let address: PostalAddress = serde_json::from_str(json).unwrap();
        assert_eq!(address, se());
    }

    #[test]
    fn cache_serves_fresh_entries_only() {
        let cache = AddressCache::new(Database::open_in_memory().unwrap()).unwrap();
        cache.put("01001000", &se()).unwrap();

        let hit = cache
            .get_fresh("01001000", chrono::Duration::days(30))
            .unwrap();
        assert_eq!(hit, Some(se()));

        let stale = cache
            .get_fresh("01001000", chrono::Duration::zero())
            .unwrap();
        assert_eq!(stale, None);

        assert_eq!(
            cache
                .get_fresh("99999999", chrono::Duration::days(30))
                .unwrap(),
            None
        );
    }
}
