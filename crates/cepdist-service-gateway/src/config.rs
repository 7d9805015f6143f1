//! Environment configuration for the gateway service.

use std::time::Duration;

use cepdist_lib::PostalService;
use cepdist_lib::postal::DEFAULT_VIACEP_BASE_URL;

/// Settings read at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// SQLite file for the CEP cache, history and users.
    pub database_url: String,
    pub port: u16,
    /// Base URL of the calculator service.
    pub calculator_url: String,
    pub viacep_url: String,
    /// Deadline for each outbound call (ViaCEP and calculator).
    pub upstream_timeout: Duration,
    /// How long a cached CEP is served without asking ViaCEP again.
    pub cache_ttl_days: i64,
}

impl GatewayConfig {
    pub const DEFAULT_DATABASE_URL: &'static str = "addresses.db";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const DEFAULT_CALCULATOR_URL: &'static str = "http://api-secundaria:5000";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Read `DATABASE_URL`, `SERVICE_PORT`, `SECONDARY_API_URL`,
    /// `VIACEP_BASE_URL`, `UPSTREAM_TIMEOUT_SECS` and `ADDRESS_CACHE_TTL_DAYS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let database_url = text("DATABASE_URL", Self::DEFAULT_DATABASE_URL);
        let database_url = database_url
            .strip_prefix("sqlite:///")
            .or_else(|| database_url.strip_prefix("sqlite://"))
            .unwrap_or(&database_url)
            .to_string();

        let port = lookup("SERVICE_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_PORT);
        let timeout_secs = lookup("UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        let cache_ttl_days = lookup("ADDRESS_CACHE_TTL_DAYS")
            .and_then(|d| d.trim().parse::<i64>().ok())
            .filter(|d| *d >= 0)
            .unwrap_or(PostalService::DEFAULT_TTL_DAYS);

        Self {
            database_url,
            port,
            calculator_url: text("SECONDARY_API_URL", Self::DEFAULT_CALCULATOR_URL),
            viacep_url: text("VIACEP_BASE_URL", DEFAULT_VIACEP_BASE_URL),
            upstream_timeout: Duration::from_secs(timeout_secs),
            cache_ttl_days,
        }
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_ttl_days)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.database_url, "addresses.db");
        assert_eq!(config.port, 8000);
        assert_eq!(config.calculator_url, "http://api-secundaria:5000");
        assert_eq!(config.viacep_url, "https://viacep.com.br");
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_ttl(), chrono::Duration::days(30));
    }

    #[test]
    fn reads_overrides() {
        let config = GatewayConfig::from_lookup(|key| {
            let value = match key {
                "DATABASE_URL" => "sqlite:///./gateway.db",
                "SERVICE_PORT" => "8080",
                "SECONDARY_API_URL" => "http://localhost:5000",
                "UPSTREAM_TIMEOUT_SECS" => "3",
                "ADDRESS_CACHE_TTL_DAYS" => "0",
                _ => return None,
            };
            Some(value.to_string())
        });
        assert_eq!(config.database_url, "./gateway.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.calculator_url, "http://localhost:5000");
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert_eq!(config.cache_ttl_days, 0);
    }

    #[test]
    fn zero_timeout_is_ignored() {
        let config = GatewayConfig::from_lookup(|key| {
            (key == "UPSTREAM_TIMEOUT_SECS").then(|| "0".to_string())
        });
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }
}
