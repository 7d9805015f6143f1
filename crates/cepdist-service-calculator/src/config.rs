//! Environment configuration for the calculator service.

/// Settings read at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatorConfig {
    /// SQLite file holding calculations and configuration.
    pub database_url: String,
    pub port: u16,
}

impl CalculatorConfig {
    pub const DEFAULT_DATABASE_URL: &'static str = "distance_calculations.db";
    pub const DEFAULT_PORT: u16 = 5000;

    /// Read `DATABASE_URL` and `SERVICE_PORT`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL")
            .map(|url| strip_sqlite_scheme(&url).to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string());
        let port = lookup("SERVICE_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_PORT);

        Self { database_url, port }
    }
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Accept `sqlite:///path.db` style URLs as well as bare paths.
fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CalculatorConfig::default();
        assert_eq!(config.database_url, "distance_calculations.db");
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn reads_overrides() {
        let config = CalculatorConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite:///./data/calc.db".to_string()),
            "SERVICE_PORT" => Some("5050".to_string()),
            _ => None,
        });
        assert_eq!(config.database_url, "./data/calc.db");
        assert_eq!(config.port, 5050);
    }

    #[test]
    fn bad_port_falls_back() {
        let config = CalculatorConfig::from_lookup(|key| {
            (key == "SERVICE_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.port, 5000);
    }
}
