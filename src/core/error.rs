use std::time::Duration;

use url::Url;

/// Reasons an authorization request is rejected as malformed or untrustworthy.
///
/// These failures are permanent for the request that produced them and must not be retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidatedAuthorizationError {
    #[error("missing required field `{0}`")]
    MissingRequiredField(String),
    #[error("unsupported response_type `{0}`")]
    UnsupportedResponseType(String),
    #[error("unsupported response_mode `{0}`")]
    UnsupportedResponseMode(String),
    #[error("invalid request_uri `{0}`")]
    InvalidRequestUri(String),
    #[error("request_uri did not resolve to a request object")]
    InvalidJwtPayload,
    #[error("authorization request data could not be decoded")]
    InvalidAuthorizationData,
    #[error("client_id mismatch: expected `{expected}`, found `{actual}`")]
    ClientIdMismatch { expected: String, actual: String },
    #[error("validation failed: {0}")]
    ValidationError(String),
    /// Internal invariant violation.
    #[error("authorization request data is conflicting")]
    ConflictingData,
}

impl ValidatedAuthorizationError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

/// Failures of remote lookups (request objects, JWKS).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unexpected status code {0}")]
    InvalidStatusCode(u16),
    #[error("network error: {0:#}")]
    NetworkError(anyhow::Error),
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: Url, after: Duration },
    #[error("response body from {0} was not valid UTF-8")]
    InvalidResponse(Url),
}

/// Top level failure of a validation call.
///
/// Fetch failures are transient and may be retried by the caller, validation failures are not.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Invalid(#[from] ValidatedAuthorizationError),
}

impl AuthorizationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthorizationError::Fetch(FetchError::NetworkError(_))
            | AuthorizationError::Fetch(FetchError::Timeout { .. }) => true,
            AuthorizationError::Fetch(FetchError::InvalidStatusCode(code)) => *code >= 500,
            AuthorizationError::Fetch(FetchError::InvalidResponse(_))
            | AuthorizationError::Invalid(_) => false,
        }
    }

    /// The validation error, if this is not a fetch failure.
    pub fn as_invalid(&self) -> Option<&ValidatedAuthorizationError> {
        match self {
            AuthorizationError::Invalid(e) => Some(e),
            AuthorizationError::Fetch(_) => None,
        }
    }
}
