use serde::{Deserialize, Serialize};

use crate::error::AwsProviderError;

/// Default STS session name used when assuming a role.
pub const DEFAULT_SESSION_NAME: &str = "drift-aws-provider";

/// Shared AWS connection settings for every resource adapter.
///
/// Holds the region, an optional named profile, an optional STS assume-role
/// ARN for cross-account access, and an endpoint URL override for local
/// development (e.g. `LocalStack`).
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsBaseConfig {
    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Optional named profile from the shared config/credentials files.
    #[serde(default)]
    pub profile: Option<String>,

    /// Optional IAM role ARN to assume via STS for cross-account access.
    #[serde(default)]
    pub role_arn: Option<String>,

    /// Optional endpoint URL override for local development (e.g. `LocalStack`).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Optional STS session name (defaults to [`DEFAULT_SESSION_NAME`]).
    #[serde(default)]
    pub session_name: Option<String>,

    /// Optional external ID for cross-account trust policies.
    #[serde(default)]
    pub external_id: Option<String>,
}

impl std::fmt::Debug for AwsBaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsBaseConfig")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint_url", &self.endpoint_url)
            .field("session_name", &self.session_name)
            .field("external_id", &self.external_id.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AwsBaseConfig {
    /// Create a new `AwsBaseConfig` with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            profile: None,
            role_arn: None,
            endpoint_url: None,
            session_name: None,
            external_id: None,
        }
    }

    /// Use a named profile for credentials.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set an IAM role ARN to assume via STS.
    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set an endpoint URL override for local development.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set the STS session name for assume-role.
    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Set the external ID for cross-account trust policies.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// The session name to use when assuming `role_arn`.
    pub fn session_name(&self) -> &str {
        self.session_name.as_deref().unwrap_or(DEFAULT_SESSION_NAME)
    }

    /// Check the settings before any client is built.
    pub fn validate(&self) -> Result<(), AwsProviderError> {
        if self.region.trim().is_empty() {
            return Err(AwsProviderError::Configuration(
                "region must not be empty".to_owned(),
            ));
        }
        if let Some(role_arn) = &self.role_arn
            && !role_arn.starts_with("arn:")
        {
            return Err(AwsProviderError::Configuration(format!(
                "role_arn '{role_arn}' is not an ARN"
            )));
        }
        if let Some(endpoint) = &self.endpoint_url
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(AwsProviderError::Configuration(format!(
                "endpoint_url '{endpoint}' must be an http(s) URL"
            )));
        }
        if self.external_id.is_some() && self.role_arn.is_none() {
            return Err(AwsProviderError::Configuration(
                "external_id requires role_arn".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for AwsBaseConfig {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}
