//! Response wrapper for successful HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ProblemDetails;

/// Result type returned by every JSON handler: a success body or an RFC 9457
/// problem.
pub type ApiResult<T> = Result<ServiceResponse<T>, ProblemDetails>;

/// Successful JSON response with its status code.
///
/// # Example
///
/// ```
/// use cepdist_service_shared::ServiceResponse;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Deleted {
///     status: &'static str,
///     id: String,
/// }
///
/// let response = ServiceResponse::ok(Deleted { status: "deleted", id: "42".into() });
/// assert_eq!(response.status.as_u16(), 200);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceResponse<T> {
    pub status: StatusCode,
    pub data: T,
}

impl<T> ServiceResponse<T> {
    /// 200 OK with `data` as the body.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    /// 201 Created with `data` as the body.
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T> From<T> for ServiceResponse<T> {
    fn from(data: T) -> Self {
        Self::ok(data)
    }
}

impl<T: Serialize> IntoResponse for ServiceResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.data)).into_response()
    }
}

/// 204 No Content response, or a problem.
pub type EmptyResult = Result<StatusCode, ProblemDetails>;
