use std::fmt;

use thiserror::Error;

/// Convenient result alias for the cepdist library.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of persisted or remote resource referenced by [`Error::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Calculation,
    HistoryEntry,
    User,
    PostalCode,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Resource::Calculation => "calculation",
            Resource::HistoryEntry => "history entry",
            Resource::User => "user",
            Resource::PostalCode => "postal code",
        };
        f.write_str(value)
    }
}

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A latitude or longitude was missing, non-finite or out of range.
    #[error("invalid coordinate: {field} = {value} (expected {range})")]
    InvalidCoordinate {
        field: &'static str,
        value: String,
        range: &'static str,
    },

    /// The travel mode is not one of `direct`, `walking` or `driving`.
    #[error("unsupported travel mode '{mode}'; expected one of: direct, walking, driving")]
    UnsupportedMode { mode: String },

    /// A configuration update was rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A postal code did not normalize to eight digits.
    #[error("postal code '{cep}' must contain exactly 8 digits")]
    InvalidPostalCode { cep: String },

    /// User payload failed validation.
    #[error("invalid user: {message}")]
    InvalidUser { message: String },

    /// The referenced resource does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: Resource, id: String },

    /// The write would violate a uniqueness rule.
    #[error("{message}")]
    Conflict { message: String },

    /// An outbound call did not complete within its deadline.
    #[error("{upstream} did not respond in time")]
    UpstreamTimeout { upstream: &'static str },

    /// An outbound call could not be completed.
    #[error("{upstream} is unavailable: {message}")]
    UpstreamUnavailable {
        upstream: &'static str,
        message: String,
    },

    /// The upstream service answered with a failure that should be relayed as-is.
    #[error("{upstream} rejected the request with status {status}: {detail}")]
    UpstreamRejected {
        upstream: &'static str,
        status: u16,
        problem_type: Option<String>,
        detail: String,
    },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client errors that are not classified as upstream failures.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn not_found(resource: Resource, id: impl Into<String>) -> Self {
        Error::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Classify a transport error raised while talking to `upstream`.
    pub fn from_upstream(upstream: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::UpstreamTimeout { upstream }
        } else {
            Error::UpstreamUnavailable {
                upstream,
                message: err.to_string(),
            }
        }
    }

    /// Short machine-friendly label, used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidCoordinate { .. } => "invalid_coordinate",
            Error::UnsupportedMode { .. } => "unsupported_mode",
            Error::InvalidConfiguration { .. } => "invalid_configuration",
            Error::InvalidPostalCode { .. } | Error::InvalidUser { .. } => "validation_error",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::UpstreamTimeout { .. } => "upstream_timeout",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
            Error::UpstreamRejected { .. } => "upstream_rejected",
            Error::Sqlite(_) | Error::Json(_) | Error::Http(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_resource() {
        let err = Error::not_found(Resource::Calculation, "abc");
        assert_eq!(err.to_string(), "calculation 'abc' not found");
        assert_eq!(err.reason(), "not_found");
    }

    #[test]
    fn unsupported_mode_lists_valid_modes() {
        let err = Error::UnsupportedMode {
            mode: "flying".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("flying"));
        assert!(message.contains("direct, walking, driving"));
    }
}
