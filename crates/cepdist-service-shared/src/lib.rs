//! Shared infrastructure for the cepdist HTTP services.
//!
//! This crate provides common functionality used by the calculator and the
//! gateway:
//!
//! - [`ServiceState`]: What the shared handlers need from a service's state
//! - [`health`]: Liveness and readiness handlers
//! - [`ProblemDetails`]: RFC 9457 Problem Details for consistent error responses
//! - [`ServiceResponse`]: Successful JSON response with status code
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request ids, request spans and HTTP metrics
//! - Request types with validation for each endpoint
//!
//! # Architecture
//!
//! The services follow a thin-handler pattern where all business logic resides
//! in `cepdist-lib`. This crate provides only HTTP glue:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Parse request JSON                                       │
//! │  - Validate parameters                                      │
//! │  - Call cepdist-lib APIs                                    │
//! │  - Format response or Problem Details                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides fixtures for handler testing. Enable the
//! `test-utils` feature to access it from dependent crates.

#![deny(warnings)]

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod response;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_calculation, record_calculation_failed,
    record_postal_lookup, record_upstream_failure, MetricsConfig, MetricsError,
};
pub use middleware::{cors_layer, extract_or_generate_request_id, MetricsLayer, RequestId};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_CONFLICT, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_CONFIGURATION, PROBLEM_INVALID_COORDINATE, PROBLEM_INVALID_REQUEST,
    PROBLEM_NOT_FOUND, PROBLEM_UNSUPPORTED_MODE, PROBLEM_UPSTREAM_REJECTED,
    PROBLEM_UPSTREAM_TIMEOUT, PROBLEM_UPSTREAM_UNAVAILABLE,
};
pub use request::{
    ApiJson, ApiQuery, CalculateRequest, ConfigurationRequest, DistanceRequest, PageQuery,
    Validate,
};
pub use response::{ApiResult, EmptyResult, ServiceResponse};
pub use state::ServiceState;
