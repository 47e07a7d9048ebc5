//! Provider settings loaded from TOML.
//!
//! ```toml
//! region = "us-east-1"
//! role_arn = "arn:aws:iam::123456789012:role/drift"
//! operation_timeout_secs = 900
//!
//! [qldb]
//! create_timeout_secs = 480
//! delete_timeout_secs = 300
//! poll_interval_secs = 10
//! ```

use std::path::Path;
use std::time::Duration;

use drift_provider::{OperationContext, ProviderError, ResourceRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AwsBaseConfig;
use crate::error::AwsProviderError;
use crate::qldb::StreamTimeouts;

/// Waiter timings for the QLDB stream adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QldbSettings {
    pub create_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for QldbSettings {
    fn default() -> Self {
        let timeouts = StreamTimeouts::default();
        Self {
            create_timeout_secs: timeouts.create.as_secs(),
            delete_timeout_secs: timeouts.delete.as_secs(),
            poll_interval_secs: timeouts.poll_interval.as_secs(),
        }
    }
}

impl QldbSettings {
    pub fn timeouts(&self) -> StreamTimeouts {
        StreamTimeouts {
            create: Duration::from_secs(self.create_timeout_secs),
            delete: Duration::from_secs(self.delete_timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    fn validate(&self) -> Result<(), AwsProviderError> {
        if self.poll_interval_secs == 0 {
            return Err(AwsProviderError::Configuration(
                "qldb.poll_interval_secs must be positive".to_owned(),
            ));
        }
        if self.create_timeout_secs < self.poll_interval_secs
            || self.delete_timeout_secs < self.poll_interval_secs
        {
            return Err(AwsProviderError::Configuration(
                "qldb timeouts must be at least one poll interval".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to stand up the AWS resource registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Shared AWS connection settings.
    #[serde(flatten)]
    pub aws: AwsBaseConfig,

    /// Deadline applied to each host operation, if any.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,

    #[serde(default)]
    pub qldb: QldbSettings,
}

impl ProviderSettings {
    pub fn new(aws: AwsBaseConfig) -> Self {
        Self {
            aws,
            operation_timeout_secs: None,
            qldb: QldbSettings::default(),
        }
    }

    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, AwsProviderError> {
        let settings: Self = toml::from_str(input)
            .map_err(|e| AwsProviderError::Configuration(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AwsProviderError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading provider settings");
        let input = std::fs::read_to_string(path).map_err(|e| {
            AwsProviderError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), AwsProviderError> {
        self.aws.validate()?;
        self.qldb.validate()?;
        if self.operation_timeout_secs == Some(0) {
            return Err(AwsProviderError::Configuration(
                "operation_timeout_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// A fresh context carrying the configured operation deadline.
    pub fn operation_context(&self) -> OperationContext {
        match self.operation_timeout_secs {
            Some(secs) => OperationContext::new().with_timeout(Duration::from_secs(secs)),
            None => OperationContext::new(),
        }
    }

    /// Build a registry with one AWS-backed adapter per enabled service.
    ///
    /// Credentials are resolved once and shared by every client.
    pub async fn build_registry(&self) -> Result<ResourceRegistry, ProviderError> {
        self.validate()?;
        let sdk_config = crate::auth::build_sdk_config(&self.aws).await;
        let mut registry = ResourceRegistry::new();

        #[cfg(feature = "simpledb")]
        registry.register(std::sync::Arc::new(
            crate::simpledb::DomainResource::from_sdk_config(&sdk_config)?,
        ))?;

        #[cfg(feature = "qldb")]
        registry.register(std::sync::Arc::new(
            crate::qldb::StreamResource::from_sdk_config(&sdk_config, self.qldb.timeouts()),
        ))?;

        #[cfg(not(any(feature = "simpledb", feature = "qldb")))]
        let _ = sdk_config;

        info!(
            region = %self.aws.region,
            resources = ?registry.metadata(),
            "AWS resource registry ready"
        );
        Ok(registry)
    }
}
