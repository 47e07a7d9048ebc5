use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during resource operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote service confirmed the object does not exist.
    #[error("couldn't find resource: {0}")]
    NotFound(String),

    /// The remote call succeeded but returned no usable payload.
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// The remote service rejected or failed the request.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The operation did not complete within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The ambient operation context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The adapter or client was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The remote service rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// The planned or stored record does not have the expected shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// Returns `true` if the error is transient and the operation may succeed
    /// on retry. Adapters never retry on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }

    /// Returns `true` if the service confirmed the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<drift_core::KeyError> for ProviderError {
    fn from(err: drift_core::KeyError) -> Self {
        Self::Validation(err.to_string())
    }
}
