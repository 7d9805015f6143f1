//! Test utilities for handler testing across the service crates.

use cepdist_lib::{Address, Database};

/// Fresh in-memory database.
///
/// # Panics
///
/// Panics if SQLite cannot open an in-memory database, which indicates a
/// broken test environment.
pub fn test_database() -> Database {
    Database::open_in_memory().unwrap_or_else(|e| panic!("in-memory database: {e}"))
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}

/// Well-known places with fixed coordinates.
pub mod fixture_places {
    use super::Address;

    /// Praça da Sé, São Paulo.
    pub fn sao_paulo() -> Address {
        Address::new("São Paulo", "SP", "Praça da Sé, Sé").with_coordinates(-23.5505, -46.6333)
    }

    /// Avenida Rio Branco, Rio de Janeiro.
    pub fn rio_de_janeiro() -> Address {
        Address::new("Rio de Janeiro", "RJ", "Avenida Rio Branco, Centro")
            .with_coordinates(-22.9068, -43.1729)
    }

    /// Driving distance between the two fixtures under default multipliers.
    pub const SP_RJ_DRIVING_KM: f64 = 396.82;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_unique() {
        assert_ne!(test_request_id(), test_request_id());
    }

    #[test]
    fn test_database_answers() {
        assert!(test_database().ping().is_ok());
    }

    #[test]
    fn test_fixture_places_have_coordinates() {
        let sp = fixture_places::sao_paulo();
        assert!(sp.latitude.is_some() && sp.longitude.is_some());
    }
}
