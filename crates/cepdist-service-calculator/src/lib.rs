//! Distance calculator HTTP service.
//!
//! Computes great-circle distances between addresses, scales them by the
//! travel-mode multiplier from the stored configuration, and keeps a history
//! of every calculation.
//!
//! # Endpoints
//!
//! - `GET /` - Service banner
//! - `POST /calculate` - Compute and store a distance
//! - `GET /calculations` - List stored calculations (most recent first)
//! - `GET /calculations/{id}` / `DELETE /calculations/{id}`
//! - `GET /configurations` / `PUT /configurations` - Multipliers and unit
//! - `GET /health`, `GET /health/live`, `GET /health/ready`
//! - `GET /metrics` - Prometheus metrics endpoint

#![deny(warnings)]

pub mod config;

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use cepdist_lib::{
    CalculationRecord, Calculator, Configuration, ConfigurationChange, Database,
    Result as LibResult,
};
use cepdist_service_shared::{
    ApiJson, ApiQuery, ApiResult, CalculateRequest, ConfigurationRequest, MetricsLayer, PageQuery,
    ProblemDetails, RequestId, ServiceResponse, ServiceState, Validate, from_lib_error,
    health_live, health_ready, metrics_handler, record_calculation, record_calculation_failed,
};

pub use config::CalculatorConfig;

/// Name used in logs, metrics and health responses.
pub const SERVICE_NAME: &str = "calculator";

/// Shared state: the calculator and the database behind it.
#[derive(Clone, Debug)]
pub struct CalculatorState {
    calculator: Calculator,
    database: Database,
}

impl CalculatorState {
    pub fn new(database: Database) -> LibResult<Self> {
        Ok(Self {
            calculator: Calculator::new(database.clone())?,
            database,
        })
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }
}

impl ServiceState for CalculatorState {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn database(&self) -> &Database {
        &self.database
    }
}

/// Build the service router.
pub fn router(state: CalculatorState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/calculate", post(calculate))
        .route("/calculations", get(list_calculations))
        .route(
            "/calculations/{id}",
            get(get_calculation).delete(delete_calculation),
        )
        .route(
            "/configurations",
            get(get_configuration).put(update_configuration),
        )
        .route("/health", get(health_ready::<CalculatorState>))
        .route("/health/live", get(health_live::<CalculatorState>))
        .route("/health/ready", get(health_ready::<CalculatorState>))
        .route("/metrics", get(metrics_handler))
        .fallback(fallback)
        .layer(MetricsLayer::for_service(SERVICE_NAME))
        .with_state(state)
}

async fn index() -> ServiceResponse<Value> {
    ServiceResponse::ok(json!({
        "service": "cepdist distance calculator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "calculate": "POST /calculate",
            "calculations": "GET /calculations",
            "calculation": "GET|DELETE /calculations/{id}",
            "configurations": "GET|PUT /configurations",
            "health": "GET /health",
            "metrics": "GET /metrics",
        }
    }))
}

/// Handle POST /calculate.
async fn calculate(
    State(state): State<CalculatorState>,
    request_id: RequestId,
    ApiJson(request): ApiJson<CalculateRequest>,
) -> ApiResult<CalculationRecord> {
    info!(
        request_id = %request_id,
        origin = %request.origin.city,
        destination = %request.destination.city,
        mode = %request.mode,
        "handling calculate request"
    );

    let mode = match request
        .validate(request_id.as_str())
        .and_then(|()| request.travel_mode(request_id.as_str()))
    {
        Ok(mode) => mode,
        Err(problem) => {
            record_calculation_failed("validation_error");
            return Err(*problem);
        }
    };

    let record = state
        .calculator
        .calculate(&request.origin, &request.destination, mode)
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, "calculation failed");
            record_calculation_failed(e.reason());
            from_lib_error(&e, request_id.as_str())
        })?;

    record_calculation(record.mode, record.unit.to_km(record.distance));
    info!(
        request_id = %request_id,
        id = %record.id,
        distance = record.distance,
        unit = %record.unit,
        "calculation stored"
    );

    Ok(ServiceResponse::ok(record))
}

/// Handle GET /calculations.
async fn list_calculations(
    State(state): State<CalculatorState>,
    request_id: RequestId,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Vec<CalculationRecord>> {
    query.validate(request_id.as_str()).map_err(|p| *p)?;
    state
        .calculator
        .calculations()
        .list(query.page())
        .map(ServiceResponse::ok)
        .map_err(|e| from_lib_error(&e, request_id.as_str()))
}

async fn get_calculation(
    State(state): State<CalculatorState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<CalculationRecord> {
    state
        .calculator
        .calculations()
        .get(&id)
        .map(ServiceResponse::ok)
        .map_err(|e| from_lib_error(&e, request_id.as_str()))
}

#[derive(Debug, Serialize)]
struct Deleted {
    status: &'static str,
    id: String,
}

async fn delete_calculation(
    State(state): State<CalculatorState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    state
        .calculator
        .calculations()
        .delete(&id)
        .map_err(|e| from_lib_error(&e, request_id.as_str()))?;

    info!(request_id = %request_id, id = %id, "calculation deleted");
    Ok(ServiceResponse::ok(Deleted {
        status: "deleted",
        id,
    }))
}

async fn get_configuration(
    State(state): State<CalculatorState>,
    request_id: RequestId,
) -> ApiResult<Configuration> {
    state
        .calculator
        .configuration()
        .get()
        .map(ServiceResponse::ok)
        .map_err(|e| from_lib_error(&e, request_id.as_str()))
}

/// Handle PUT /configurations. The whole update is applied or none of it.
async fn update_configuration(
    State(state): State<CalculatorState>,
    request_id: RequestId,
    ApiJson(request): ApiJson<ConfigurationRequest>,
) -> ApiResult<ConfigurationChange> {
    request.validate(request_id.as_str()).map_err(|p| *p)?;

    let change = state
        .calculator
        .configuration()
        .update(&request.configurations)
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, "configuration update rejected");
            from_lib_error(&e, request_id.as_str())
        })?;

    info!(
        request_id = %request_id,
        updated = ?change.updated,
        ignored = ?change.ignored,
        "configuration updated"
    );
    Ok(ServiceResponse::ok(change))
}

/// Problem Details for unknown routes, so every error shares one shape.
async fn fallback(request_id: RequestId) -> ProblemDetails {
    ProblemDetails::not_found("no such endpoint", request_id.as_str())
}
