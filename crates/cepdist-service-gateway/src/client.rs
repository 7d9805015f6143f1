//! HTTP client for the calculator service.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use cepdist_lib::{Address, CalculationRecord, Error, Result, TravelMode};
use cepdist_service_shared::ProblemDetails;

/// Name used for the calculator in errors, logs and metrics.
pub const CALCULATOR: &str = "calculator";

#[derive(Debug, Serialize)]
struct CalculateBody<'a> {
    origin: &'a Address,
    destination: &'a Address,
    mode: TravelMode,
}

/// Forwards distance requests to `POST {base}/calculate`.
#[derive(Debug, Clone)]
pub struct CalculatorClient {
    http: Client,
    base_url: String,
}

impl CalculatorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Ask the calculator for the distance between two addresses.
    ///
    /// A problem response from the calculator becomes
    /// [`Error::UpstreamRejected`] carrying its status, type and detail.
    pub async fn calculate(
        &self,
        origin: &Address,
        destination: &Address,
        mode: TravelMode,
        request_id: &str,
    ) -> Result<CalculationRecord> {
        let url = format!("{}/calculate", self.base_url);
        debug!(%url, %mode, "forwarding calculation");

        let response = self
            .http
            .post(&url)
            .header("x-request-id", request_id)
            .json(&CalculateBody {
                origin,
                destination,
                mode,
            })
            .send()
            .await
            .map_err(|e| Error::from_upstream(CALCULATOR, e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<CalculationRecord>()
                .await
                .map_err(|e| Error::from_upstream(CALCULATOR, e));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_upstream(CALCULATOR, e))?;
        warn!(status = status.as_u16(), "calculator rejected the request");

        Err(match serde_json::from_str::<ProblemDetails>(&body) {
            Ok(problem) => Error::UpstreamRejected {
                upstream: CALCULATOR,
                status: status.as_u16(),
                detail: problem.detail.unwrap_or(problem.title),
                problem_type: Some(problem.type_uri),
            },
            Err(_) => Error::UpstreamRejected {
                upstream: CALCULATOR,
                status: status.as_u16(),
                problem_type: None,
                detail: if body.trim().is_empty() {
                    format!("calculator answered {status}")
                } else {
                    body
                },
            },
        })
    }
}
