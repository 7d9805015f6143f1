//! Request types, extractors and validation for HTTP endpoints.

use axum::extract::{FromRequest, FromRequestParts, Json, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use cepdist_lib::{Address, ConfigurationUpdate, Page, TravelMode};

use crate::middleware::RequestId;
use crate::ProblemDetails;

/// Validation trait for request types.
///
/// Implementations should validate all fields and return a `ProblemDetails`
/// error for invalid input.
pub trait Validate {
    /// Validate the request, returning an error if invalid.
    ///
    /// The `request_id` is used to populate the `instance` field of any
    /// returned `ProblemDetails`.
    ///
    /// Returns a boxed `ProblemDetails` to avoid large `Result::Err` variants.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// JSON body extractor whose rejection is a 400 Problem Details document
/// instead of axum's plain-text response.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ProblemDetails;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = RequestId::of(req.extensions(), req.headers());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ProblemDetails::bad_request(
                rejection.body_text(),
                request_id.as_str(),
            )),
        }
    }
}

/// Query-string extractor with the same rejection shape as [`ApiJson`].
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ProblemDetails;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => {
                let request_id = RequestId::of(&parts.extensions, &parts.headers);
                Err(ProblemDetails::bad_request(
                    rejection.body_text(),
                    request_id.as_str(),
                ))
            }
        }
    }
}

fn default_mode() -> String {
    TravelMode::default().as_str().to_string()
}

fn parse_mode(
    mode: &str,
    field: &str,
    request_id: &str,
) -> Result<TravelMode, Box<ProblemDetails>> {
    mode.parse::<TravelMode>().map_err(|e| {
        Box::new(
            crate::from_lib_error(&e, request_id)
                .with_detail(format!("The '{field}' field is invalid: {e}")),
        )
    })
}

fn require_place(
    address: &Address,
    field: &str,
    request_id: &str,
) -> Result<(), Box<ProblemDetails>> {
    if address.city.trim().is_empty() {
        return Err(Box::new(ProblemDetails::bad_request(
            format!("The '{field}.city' field is required and cannot be empty"),
            request_id,
        )));
    }
    if address.state.trim().is_empty() {
        return Err(Box::new(ProblemDetails::bad_request(
            format!("The '{field}.state' field is required and cannot be empty"),
            request_id,
        )));
    }
    Ok(())
}

/// Body of `POST /calculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub origin: Address,
    pub destination: Address,
    /// Travel mode name; kept as text so unknown values get a proper 400.
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl CalculateRequest {
    /// The parsed travel mode. Call after [`Validate::validate`].
    pub fn travel_mode(&self, request_id: &str) -> Result<TravelMode, Box<ProblemDetails>> {
        parse_mode(&self.mode, "mode", request_id)
    }
}

impl Validate for CalculateRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        require_place(&self.origin, "origin", request_id)?;
        require_place(&self.destination, "destination", request_id)?;
        self.travel_mode(request_id)?;
        Ok(())
    }
}

/// Body of `PUT /configurations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationRequest {
    pub configurations: ConfigurationUpdate,
}

impl Validate for ConfigurationRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        if self.configurations.is_empty() {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'configurations' field must contain at least one key",
                request_id,
            )));
        }
        Ok(())
    }
}

/// Body of `POST /distances` on the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceRequest {
    pub origin_cep: String,
    pub destination_cep: String,
    #[serde(default = "default_mode")]
    pub travel_mode: String,
}

impl DistanceRequest {
    pub fn travel_mode(&self, request_id: &str) -> Result<TravelMode, Box<ProblemDetails>> {
        parse_mode(&self.travel_mode, "travel_mode", request_id)
    }
}

impl Validate for DistanceRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        if self.origin_cep.trim().is_empty() {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'origin_cep' field is required and cannot be empty",
                request_id,
            )));
        }
        if self.destination_cep.trim().is_empty() {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'destination_cep' field is required and cannot be empty",
                request_id,
            )));
        }
        self.travel_mode(request_id)?;
        Ok(())
    }
}

/// Pagination query parameters.
///
/// `skip` is accepted as an alias of `offset`; the gateway's history
/// endpoint has always used that name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default, alias = "skip")]
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(
            self.limit.unwrap_or(Page::DEFAULT_LIMIT),
            self.offset.unwrap_or(0),
        )
    }
}

impl Validate for PageQuery {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        match self.limit {
            Some(0) => Err(Box::new(ProblemDetails::bad_request(
                "The 'limit' field must be at least 1",
                request_id,
            ))),
            Some(limit) if limit > Page::MAX_LIMIT => Err(Box::new(ProblemDetails::bad_request(
                format!("The 'limit' field cannot exceed {}", Page::MAX_LIMIT),
                request_id,
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PROBLEM_INVALID_REQUEST, PROBLEM_UNSUPPORTED_MODE};

    fn calculate(mode: &str) -> CalculateRequest {
        CalculateRequest {
            origin: Address::new("São Paulo", "SP", "Praça da Sé"),
            destination: Address::new("Rio de Janeiro", "RJ", "Centro"),
            mode: mode.to_string(),
        }
    }

    #[test]
    fn test_calculate_request_valid() {
        let req = calculate("Walking");
        assert!(req.validate("test").is_ok());
        assert_eq!(req.travel_mode("test").unwrap(), TravelMode::Walking);
    }

    #[test]
    fn test_calculate_request_mode_defaults_to_direct() {
        let json = r#"{"origin":{"city":"A","state":"AA"},"destination":{"city":"B","state":"BB"}}"#;
        let req: CalculateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mode, "direct");
        assert_eq!(req.origin.address, "");
    }

    #[test]
    fn test_calculate_request_unknown_mode() {
        let err = calculate("flying").validate("req-1").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_UNSUPPORTED_MODE);
        assert_eq!(err.status, 400);
        assert!(err.detail.as_deref().unwrap().contains("'mode'"));
        assert_eq!(err.instance.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_calculate_request_empty_city() {
        let mut req = calculate("direct");
        req.destination.city = "  ".to_string();
        let err = req.validate("test").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_INVALID_REQUEST);
        assert!(err.detail.as_deref().unwrap().contains("'destination.city'"));
    }

    #[test]
    fn test_configuration_request_must_not_be_empty() {
        let req: ConfigurationRequest = serde_json::from_str(r#"{"configurations":{}}"#).unwrap();
        assert!(req.validate("test").is_err());

        let req: ConfigurationRequest =
            serde_json::from_str(r#"{"configurations":{"walking_multiplier":1.5}}"#).unwrap();
        assert!(req.validate("test").is_ok());
    }

    #[test]
    fn test_distance_request_checks_mode_and_ceps() {
        let json = r#"{"origin_cep":"01001-000","destination_cep":"20040-020"}"#;
        let req: DistanceRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate("test").is_ok());
        assert_eq!(req.travel_mode("test").unwrap(), TravelMode::Direct);

        let bad = DistanceRequest {
            travel_mode: "teleport".to_string(),
            ..req.clone()
        };
        assert_eq!(
            bad.validate("test").unwrap_err().type_uri,
            PROBLEM_UNSUPPORTED_MODE
        );

        let empty = DistanceRequest {
            origin_cep: String::new(),
            ..req
        };
        assert!(empty
            .validate("test")
            .unwrap_err()
            .detail
            .unwrap()
            .contains("'origin_cep'"));
    }

    #[test]
    fn test_page_query_defaults_and_alias() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page(), Page::default());

        let query: PageQuery = serde_json::from_str(r#"{"limit":5,"skip":20}"#).unwrap();
        assert_eq!(query.page(), Page::new(5, 20));
    }

    #[test]
    fn test_page_query_limit_bounds() {
        let zero = PageQuery {
            limit: Some(0),
            offset: None,
        };
        assert!(zero.validate("test").is_err());

        let huge = PageQuery {
            limit: Some(101),
            offset: None,
        };
        let err = huge.validate("test").unwrap_err();
        assert!(err.detail.as_deref().unwrap().contains("exceed 100"));
    }
}
