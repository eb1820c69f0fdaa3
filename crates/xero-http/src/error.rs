//! Error types for the Xero HTTP layer.

use std::time::Duration;

/// Errors that can occur when talking to the Xero API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API answered, but with a failure response.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// The classified API failure, if this error came from a response.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// A classified failure response from the Xero API.
///
/// Every variant renders a message suitable for display; the fields carry
/// the same information for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 400 with an XML fault document.
    #[error("{fault_message}: {fault_type} \n Generated by the following XML: \n {xml}")]
    ApiFault {
        fault_type: String,
        fault_message: String,
        xml: String,
        validation_errors: Vec<String>,
    },

    /// HTTP 404 that no registered entity signature recognised.
    #[error("Couldn't find object for API Endpoint {endpoint}")]
    ObjectNotFound { endpoint: String },

    /// HTTP 404 for a known entity type, e.g. an invoice.
    #[error("{entity} not found in Xero.")]
    EntityNotFound { entity: String },

    #[error("{message}")]
    TokenExpired { message: String },

    #[error("{advice}")]
    TokenInvalid { advice: String },

    /// Either an OAuth `rate limit exceeded` problem or an HTTP 429.
    ///
    /// The numeric fields are only present for 429 responses, where they
    /// come from the `retry-after` and `x-daylimit-remaining` headers.
    #[error("{message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<u64>,
        daily_limit_remaining: Option<u64>,
    },

    #[error("{advice}")]
    ConsumerKeyUnknown { advice: String },

    #[error("{message}")]
    NonceUsed {
        nonce: Option<String>,
        message: String,
    },

    #[error("{advice}")]
    OrganisationOffline { advice: String },

    /// An `oauth_problem` value outside the known set.
    #[error("{problem}:{advice}")]
    UnknownOAuthError { problem: String, advice: String },

    /// A status code the classifier has no rule for.
    #[error("Unknown response code: {status}")]
    BadResponse { status: u16 },
}

impl ApiError {
    /// Display message for this error.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// How long to wait before the next request, when the API said so.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimitExceeded {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Whether this error is an OAuth authorization problem.
    pub fn is_oauth(&self) -> bool {
        matches!(
            self,
            ApiError::TokenExpired { .. }
                | ApiError::TokenInvalid { .. }
                | ApiError::RateLimitExceeded { .. }
                | ApiError::ConsumerKeyUnknown { .. }
                | ApiError::NonceUsed { .. }
                | ApiError::OrganisationOffline { .. }
                | ApiError::UnknownOAuthError { .. }
        )
    }
}
