//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Every failure either service reports is rendered as a Problem Details
//! document with the request id in `instance`.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use cepdist_lib::Error as LibError;

/// Problem type URI for out-of-range or missing coordinates.
pub const PROBLEM_INVALID_COORDINATE: &str = "/problems/invalid-coordinate";

/// Problem type URI for unrecognized travel modes.
pub const PROBLEM_UNSUPPORTED_MODE: &str = "/problems/unsupported-mode";

/// Problem type URI for rejected configuration updates.
pub const PROBLEM_INVALID_CONFIGURATION: &str = "/problems/invalid-configuration";

/// Problem type URI for invalid request parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for unknown resources.
pub const PROBLEM_NOT_FOUND: &str = "/problems/not-found";

/// Problem type URI for uniqueness violations.
pub const PROBLEM_CONFLICT: &str = "/problems/conflict";

/// Problem type URI for outbound calls that exceeded their deadline.
pub const PROBLEM_UPSTREAM_TIMEOUT: &str = "/problems/upstream-timeout";

/// Problem type URI for outbound calls that could not be completed.
pub const PROBLEM_UPSTREAM_UNAVAILABLE: &str = "/problems/upstream-unavailable";

/// Problem type URI used when an upstream failure carries no type of its own.
pub const PROBLEM_UPSTREAM_REJECTED: &str = "/problems/upstream-rejected";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use cepdist_service_shared::{ProblemDetails, PROBLEM_NOT_FOUND};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND)
///     .with_detail("calculation '0191e7c2' not found")
///     .with_request_id("req-12345");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request id of the failing call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Create a new ProblemDetails with required fields.
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// Status as an axum `StatusCode`, falling back to 500 for nonsense values.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create a 400 Bad Request problem for invalid input.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 404 Not Found problem.
    pub fn not_found(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    /// Create a 500 Internal Server Error problem.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Convert library errors to ProblemDetails.
///
/// The `request_id` must be provided separately since library errors don't have it.
/// Storage and serialization failures are reported as 500 without leaking
/// their internals.
pub fn from_lib_error(error: &LibError, request_id: &str) -> ProblemDetails {
    let (type_uri, title, status) = match error {
        LibError::InvalidCoordinate { .. } => (
            PROBLEM_INVALID_COORDINATE,
            "Invalid Coordinate",
            StatusCode::BAD_REQUEST,
        ),
        LibError::UnsupportedMode { .. } => (
            PROBLEM_UNSUPPORTED_MODE,
            "Unsupported Travel Mode",
            StatusCode::BAD_REQUEST,
        ),
        LibError::InvalidConfiguration { .. } => (
            PROBLEM_INVALID_CONFIGURATION,
            "Invalid Configuration",
            StatusCode::BAD_REQUEST,
        ),
        LibError::InvalidPostalCode { .. } | LibError::InvalidUser { .. } => (
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        ),
        LibError::NotFound { .. } => (PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND),
        LibError::Conflict { .. } => (PROBLEM_CONFLICT, "Conflict", StatusCode::CONFLICT),
        LibError::UpstreamTimeout { .. } => (
            PROBLEM_UPSTREAM_TIMEOUT,
            "Upstream Timeout",
            StatusCode::GATEWAY_TIMEOUT,
        ),
        LibError::UpstreamUnavailable { .. } => (
            PROBLEM_UPSTREAM_UNAVAILABLE,
            "Upstream Unavailable",
            StatusCode::BAD_GATEWAY,
        ),
        LibError::UpstreamRejected {
            status,
            problem_type,
            detail,
            ..
        } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            let type_uri = problem_type.as_deref().unwrap_or(PROBLEM_UPSTREAM_REJECTED);
            let title = status.canonical_reason().unwrap_or("Upstream Rejected");
            return ProblemDetails::new(type_uri, title, status)
                .with_detail(detail.clone())
                .with_request_id(request_id);
        }
        LibError::Sqlite(_) | LibError::Json(_) | LibError::Http(_) => {
            return ProblemDetails::internal_error("internal storage error", request_id);
        }
    };

    ProblemDetails::new(type_uri, title, status)
        .with_detail(error.to_string())
        .with_request_id(request_id)
}
