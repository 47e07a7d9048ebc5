use drift_provider::ProviderError;
use thiserror::Error;

/// Errors specific to AWS API calls.
#[derive(Debug, Error)]
pub enum AwsProviderError {
    /// The service reported that the addressed object does not exist.
    #[error("AWS resource not found: {0}")]
    NotFound(String),

    /// The AWS SDK returned an error from the service.
    #[error("AWS service error: {0}")]
    ServiceError(String),

    /// The request was throttled by the AWS service.
    #[error("AWS request throttled")]
    Throttled,

    /// A network or connection error occurred communicating with AWS.
    #[error("AWS connection error: {0}")]
    Connection(String),

    /// The request timed out in the SDK transport.
    #[error("AWS request timed out: {0}")]
    Timeout(String),

    /// AWS credential resolution or authorization failed.
    #[error("credential error: {0}")]
    CredentialError(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<AwsProviderError> for ProviderError {
    fn from(err: AwsProviderError) -> Self {
        match err {
            AwsProviderError::NotFound(msg) => ProviderError::NotFound(msg),
            AwsProviderError::ServiceError(msg) => ProviderError::ExecutionFailed(msg),
            AwsProviderError::Throttled => ProviderError::RateLimited,
            AwsProviderError::Connection(msg) => ProviderError::Connection(msg),
            AwsProviderError::Timeout(msg) => {
                ProviderError::Connection(format!("request timed out: {msg}"))
            }
            AwsProviderError::CredentialError(msg) | AwsProviderError::Configuration(msg) => {
                ProviderError::Configuration(msg)
            }
        }
    }
}

/// Where in the SDK pipeline a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkFailure {
    /// The request could not be built.
    Construction,
    /// The SDK gave up waiting.
    Timeout,
    /// The request never reached the service.
    Dispatch,
    /// A response arrived but could not be parsed.
    Response,
    /// The service answered with an error.
    Service,
}

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "TooManyRequestsException",
    "ServiceUnavailable",
];

const CREDENTIAL_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AuthFailure",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// Classify a failed SDK call.
///
/// `code` is the service error code when the service answered. Codes listed
/// in `not_found_codes` mean the addressed object does not exist; everything
/// else keeps `detail` so the caller can surface it verbatim.
pub fn classify_sdk_failure(
    failure: SdkFailure,
    code: Option<&str>,
    detail: &str,
    not_found_codes: &[&str],
) -> AwsProviderError {
    match failure {
        SdkFailure::Construction => AwsProviderError::Configuration(detail.to_owned()),
        SdkFailure::Timeout => AwsProviderError::Timeout(detail.to_owned()),
        SdkFailure::Dispatch => AwsProviderError::Connection(detail.to_owned()),
        SdkFailure::Response => classify_sdk_error(detail),
        SdkFailure::Service => match code {
            Some(code) if not_found_codes.contains(&code) => {
                AwsProviderError::NotFound(detail.to_owned())
            }
            Some(code) if THROTTLING_CODES.contains(&code) => AwsProviderError::Throttled,
            Some(code) if CREDENTIAL_CODES.contains(&code) => {
                AwsProviderError::CredentialError(detail.to_owned())
            }
            Some(_) => AwsProviderError::ServiceError(detail.to_owned()),
            None => classify_sdk_error(detail),
        },
    }
}

/// Classify an AWS SDK error string into the appropriate [`AwsProviderError`].
///
/// Fallback for failures that carry no service error code: inspects the
/// message for common patterns (throttling, timeout, connection).
pub fn classify_sdk_error(error_str: &str) -> AwsProviderError {
    let lower = error_str.to_lowercase();
    if lower.contains("throttl") || lower.contains("rate exceed") || lower.contains("too many") {
        AwsProviderError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AwsProviderError::Timeout(error_str.to_owned())
    } else if lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("dns")
        || lower.contains("network")
    {
        AwsProviderError::Connection(error_str.to_owned())
    } else {
        AwsProviderError::ServiceError(error_str.to_owned())
    }
}
