//! Public gateway HTTP service.
//!
//! Resolves Brazilian postal codes (CEPs) through ViaCEP with a local cache,
//! forwards distance requests to the calculator service, and keeps a query
//! history and a small user registry.
//!
//! # Endpoints
//!
//! - `GET /` - Service banner
//! - `GET /address/{cep}` - Resolve a CEP
//! - `POST /distances` - Distance between two CEPs
//! - `GET /history`, `DELETE /history/{id}`
//! - `POST /users`, `GET|PUT|DELETE /users/{id}`
//! - `GET /health`, `GET /health/live`, `GET /health/ready`
//! - `GET /metrics` - Prometheus metrics endpoint

#![deny(warnings)]

pub mod client;
pub mod config;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use cepdist_lib::{
    AddressCache, Database, DistanceUnit, Error as LibError, HistoryEntry, HistoryStore,
    LookupSource, NewUser, PostalAddress, PostalLookup, PostalService, QueryType,
    Result as LibResult, TravelMode, User, UserStore, UserUpdate, ViaCepClient,
};
use cepdist_service_shared::{
    ApiJson, ApiQuery, ApiResult, DistanceRequest, EmptyResult, MetricsLayer, PageQuery,
    ProblemDetails, RequestId, ServiceResponse, ServiceState, Validate, cors_layer,
    from_lib_error, health_live, health_ready, metrics_handler, record_postal_lookup,
    record_upstream_failure,
};

pub use client::CalculatorClient;
pub use config::GatewayConfig;

/// Name used in logs, metrics and health responses.
pub const SERVICE_NAME: &str = "gateway";

/// Shared state for the gateway handlers.
#[derive(Clone, Debug)]
pub struct GatewayState {
    postal: PostalService,
    calculator: CalculatorClient,
    history: HistoryStore,
    users: UserStore,
    database: Database,
}

impl GatewayState {
    /// Wire the stores onto `database` and the upstream clients from `config`.
    pub fn new(database: Database, config: &GatewayConfig) -> LibResult<Self> {
        let viacep = ViaCepClient::new(config.viacep_url.clone(), config.upstream_timeout)?;
        let calculator =
            CalculatorClient::new(config.calculator_url.clone(), config.upstream_timeout)?;
        let cache = AddressCache::new(database.clone())?;

        Ok(Self {
            postal: PostalService::new(viacep, cache, config.cache_ttl()),
            calculator,
            history: HistoryStore::new(database.clone())?,
            users: UserStore::new(database.clone())?,
            database,
        })
    }
}

impl ServiceState for GatewayState {
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
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/address/{cep}", get(get_address))
        .route("/distances", post(create_distance))
        .route("/history", get(list_history))
        .route("/history/{id}", axum::routing::delete(delete_history))
        .route("/users", post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/health", get(health_ready::<GatewayState>))
        .route("/health/live", get(health_live::<GatewayState>))
        .route("/health/ready", get(health_ready::<GatewayState>))
        .route("/metrics", get(metrics_handler))
        .fallback(fallback)
        .layer(MetricsLayer::for_service(SERVICE_NAME))
        .layer(cors_layer())
        .with_state(state)
}

/// Turn a library error into a problem, counting upstream failures.
fn problem(error: &LibError, request_id: &RequestId) -> ProblemDetails {
    match error {
        LibError::UpstreamTimeout { upstream }
        | LibError::UpstreamUnavailable { upstream, .. }
        | LibError::UpstreamRejected { upstream, .. } => {
            warn!(request_id = %request_id, error = %error, "upstream call failed");
            record_upstream_failure(*upstream, error.reason());
        }
        _ => {}
    }
    from_lib_error(error, request_id.as_str())
}

async fn index() -> ServiceResponse<Value> {
    ServiceResponse::ok(json!({
        "service": "cepdist gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "address": "GET /address/{cep}",
            "distances": "POST /distances",
            "history": "GET /history, DELETE /history/{id}",
            "users": "POST /users, GET|PUT|DELETE /users/{id}",
            "health": "GET /health",
            "metrics": "GET /metrics",
        }
    }))
}

/// Resolve a CEP through the cache, then ViaCEP.
async fn resolve(
    state: &GatewayState,
    cep: &str,
    request_id: &RequestId,
) -> Result<PostalLookup, ProblemDetails> {
    let lookup = state
        .postal
        .lookup(cep)
        .await
        .map_err(|e| problem(&e, request_id))?;
    record_postal_lookup(lookup.source);
    Ok(lookup)
}

/// Handle GET /address/{cep}.
///
/// Only answers that came from ViaCEP are added to the history.
async fn get_address(
    State(state): State<GatewayState>,
    request_id: RequestId,
    Path(cep): Path<String>,
) -> ApiResult<PostalAddress> {
    info!(request_id = %request_id, cep = %cep, "handling address request");
    let lookup = resolve(&state, &cep, &request_id).await?;

    if lookup.source == LookupSource::Upstream {
        if let Err(e) = state.history.record(
            QueryType::AddressQuery,
            &json!({ "cep": lookup.cep }),
            &lookup.address,
        ) {
            warn!(request_id = %request_id, error = %e, "failed to record address query");
        }
    }
    Ok(ServiceResponse::ok(lookup.address))
}

/// Response of `POST /distances`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResponse {
    pub origin: PostalAddress,
    pub destination: PostalAddress,
    pub distance: f64,
    pub unit: DistanceUnit,
    pub travel_mode: TravelMode,
    pub calculation_id: String,
}

/// Handle POST /distances.
///
/// The travel mode is checked before any outbound call, and history is only
/// written once the calculator has answered successfully.
async fn create_distance(
    State(state): State<GatewayState>,
    request_id: RequestId,
    ApiJson(request): ApiJson<DistanceRequest>,
) -> ApiResult<DistanceResponse> {
    info!(
        request_id = %request_id,
        origin_cep = %request.origin_cep,
        destination_cep = %request.destination_cep,
        travel_mode = %request.travel_mode,
        "handling distance request"
    );

    let mode = request
        .validate(request_id.as_str())
        .and_then(|()| request.travel_mode(request_id.as_str()))
        .map_err(|p| *p)?;

    let origin = resolve(&state, &request.origin_cep, &request_id)
        .await?
        .address;
    let destination = resolve(&state, &request.destination_cep, &request_id)
        .await?
        .address;

    let record = state
        .calculator
        .calculate(
            &origin.to_address(),
            &destination.to_address(),
            mode,
            request_id.as_str(),
        )
        .await
        .map_err(|e| problem(&e, &request_id))?;

    let response = DistanceResponse {
        origin,
        destination,
        distance: record.distance,
        unit: record.unit,
        travel_mode: record.mode,
        calculation_id: record.id,
    };

    if let Err(e) = state
        .history
        .record(QueryType::DistanceCalculation, &request, &response)
    {
        warn!(request_id = %request_id, error = %e, "failed to record distance calculation");
    }

    info!(
        request_id = %request_id,
        distance = response.distance,
        unit = %response.unit,
        calculation_id = %response.calculation_id,
        "distance computed"
    );
    Ok(ServiceResponse::ok(response))
}

async fn list_history(
    State(state): State<GatewayState>,
    request_id: RequestId,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    query.validate(request_id.as_str()).map_err(|p| *p)?;
    state
        .history
        .list(query.page())
        .map(ServiceResponse::ok)
        .map_err(|e| problem(&e, &request_id))
}

async fn delete_history(
    State(state): State<GatewayState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> EmptyResult {
    state
        .history
        .delete(&id)
        .map_err(|e| problem(&e, &request_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_user(
    State(state): State<GatewayState>,
    request_id: RequestId,
    ApiJson(new_user): ApiJson<NewUser>,
) -> ApiResult<User> {
    let user = state
        .users
        .create(new_user)
        .map_err(|e| problem(&e, &request_id))?;
    info!(request_id = %request_id, id = %user.id, "user created");
    Ok(ServiceResponse::created(user))
}

async fn get_user(
    State(state): State<GatewayState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<User> {
    state
        .users
        .get(&id)
        .map(ServiceResponse::ok)
        .map_err(|e| problem(&e, &request_id))
}

async fn update_user(
    State(state): State<GatewayState>,
    request_id: RequestId,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<User> {
    state
        .users
        .update(&id, update)
        .map(ServiceResponse::ok)
        .map_err(|e| problem(&e, &request_id))
}

async fn delete_user(
    State(state): State<GatewayState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> EmptyResult {
    state
        .users
        .delete(&id)
        .map_err(|e| problem(&e, &request_id))?;
    info!(request_id = %request_id, id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Problem Details for unknown routes.
async fn fallback(request_id: RequestId) -> ProblemDetails {
    ProblemDetails::not_found("no such endpoint", request_id.as_str())
}
