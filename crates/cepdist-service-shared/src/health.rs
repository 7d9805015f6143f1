//! Health check handlers.
//!
//! `/health/live` answers as long as the process runs; `/health/ready` (and
//! the plain `/health` alias) also require the SQLite database to answer a
//! trivial query.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::ServiceState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>".
    pub status: String,
    pub service: String,
    pub version: String,
    /// RFC 3339 time the probe was answered.
    pub timestamp: String,
    /// Whether the database answered (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_ready: Option<bool>,
}

impl HealthStatus {
    /// Create a healthy liveness status.
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            database_ready: None,
        }
    }

    pub fn ready(service: &str, version: &str) -> Self {
        Self {
            database_ready: Some(true),
            ..Self::alive(service, version)
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            database_ready: Some(false),
            ..Self::alive(service, version)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"calculator","version":"0.1.0","timestamp":"..."}
/// ```
pub async fn health_live<S: ServiceState>(State(state): State<S>) -> impl IntoResponse {
    let status = HealthStatus::alive(state.service_name(), state.version());
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler; 503 when the database does not answer.
pub async fn health_ready<S: ServiceState>(State(state): State<S>) -> Response {
    let service = state.service_name();
    let version = state.version();

    if let Err(e) = state.database().ping() {
        warn!(error = %e, "database ping failed");
        let status = HealthStatus::not_ready(service, version, "database unavailable");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    (StatusCode::OK, Json(HealthStatus::ready(service, version))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_alive() {
        let status = HealthStatus::alive("test-service", "1.0.0");
        assert!(status.is_ok());
        assert_eq!(status.service, "test-service");
        assert_eq!(status.version, "1.0.0");
        assert!(status.database_ready.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&status.timestamp).is_ok());
    }

    #[test]
    fn test_health_status_ready() {
        let status = HealthStatus::ready("calculator", "1.0.0");
        assert!(status.is_ok());
        assert_eq!(status.database_ready, Some(true));
    }

    #[test]
    fn test_health_status_not_ready() {
        let status = HealthStatus::not_ready("calculator", "1.0.0", "no database");
        assert!(!status.is_ok());
        assert!(status.status.starts_with("not_ready:"));
        assert!(status.status.contains("no database"));
    }

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus::alive("gateway", "0.1.0");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"service\":\"gateway\""));
        assert!(!json.contains("database_ready"));
    }
}
