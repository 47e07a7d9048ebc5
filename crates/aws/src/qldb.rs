//! `aws_qldb_stream`: a QLDB journal stream into Kinesis Data Streams.
//!
//! A stream is addressed by its ledger name plus the service-generated stream
//! id. Only its tags can change in place; deleting a stream cancels it, and a
//! cancelled stream is treated as gone.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use drift_core::{Attribute, Block, ID_ATTRIBUTE, ResourceKey, ResourceState, Schema};
use drift_provider::{
    Locator, LookupResult, OperationContext, ProviderError, ReadOutcome, Resource,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Resource type name of the stream adapter.
pub const STREAM_TYPE_NAME: &str = "aws_qldb_stream";

/// Service error code for a ledger or stream that does not exist.
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

const LEDGER_NAME: &str = "ledger_name";

/// Status of a journal stream as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Active,
    Completed,
    Canceled,
    Failed,
    Impaired,
    /// A status this adapter does not know about.
    Unknown,
}

impl StreamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Impaired => "IMPAIRED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<&str> for StreamStatus {
    fn from(value: &str) -> Self {
        match value {
            "ACTIVE" => Self::Active,
            "COMPLETED" => Self::Completed,
            "CANCELED" => Self::Canceled,
            "FAILED" => Self::Failed,
            "IMPAIRED" => Self::Impaired,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinesis target of a stream, as sent to and returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisConfiguration {
    pub stream_arn: String,
    pub aggregation_enabled: Option<bool>,
}

/// A journal stream as returned by `DescribeJournalKinesisStream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub arn: Option<String>,
    pub ledger_name: String,
    pub stream_id: String,
    pub stream_name: String,
    pub role_arn: String,
    pub status: StreamStatus,
    pub creation_time: Option<DateTime<Utc>>,
    pub inclusive_start_time: Option<DateTime<Utc>>,
    pub exclusive_end_time: Option<DateTime<Utc>>,
    pub kinesis_configuration: Option<KinesisConfiguration>,
    /// Why the stream is impaired or failed (e.g. `KINESIS_STREAM_NOT_FOUND`).
    pub error_cause: Option<String>,
}

/// Parameters of `StreamJournalToKinesis`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub ledger_name: String,
    pub stream_name: String,
    pub role_arn: String,
    pub inclusive_start_time: DateTime<Utc>,
    pub exclusive_end_time: Option<DateTime<Utc>>,
    pub kinesis_configuration: KinesisConfiguration,
    pub tags: BTreeMap<String, String>,
}

/// The QLDB calls the stream adapter needs.
///
/// `Ok(None)` means the call succeeded without a payload. A missing ledger or
/// stream is `Err(ProviderError::NotFound)`.
pub trait StreamApi: Send + Sync {
    /// Start a stream and return its id.
    fn stream_journal_to_kinesis(
        &self,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send;

    fn describe_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> impl Future<Output = Result<Option<StreamDescription>, ProviderError>> + Send;

    fn cancel_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Add or overwrite tags on the resource named by `arn`.
    fn tag_resource(
        &self,
        arn: &str,
        tags: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn untag_resource(
        &self,
        arn: &str,
        keys: &[String],
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn list_tags_for_resource(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, String>, ProviderError>> + Send;
}

impl<T: StreamApi> StreamApi for Arc<T> {
    fn stream_journal_to_kinesis(
        &self,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send {
        (**self).stream_journal_to_kinesis(request)
    }

    fn describe_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> impl Future<Output = Result<Option<StreamDescription>, ProviderError>> + Send {
        (**self).describe_journal_kinesis_stream(ledger_name, stream_id)
    }

    fn cancel_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).cancel_journal_kinesis_stream(ledger_name, stream_id)
    }

    fn tag_resource(
        &self,
        arn: &str,
        tags: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).tag_resource(arn, tags)
    }

    fn untag_resource(
        &self,
        arn: &str,
        keys: &[String],
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).untag_resource(arn, keys)
    }

    fn list_tags_for_resource(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, String>, ProviderError>> + Send {
        (**self).list_tags_for_resource(arn)
    }
}

fn default_aggregation() -> bool {
    true
}

/// Stored `kinesis_configuration` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisConfigurationData {
    pub stream_arn: String,
    #[serde(default = "default_aggregation")]
    pub aggregation_enabled: bool,
}

/// Stored attributes of a stream. Times are RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ledger_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stream_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inclusive_start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinesis_configuration: Vec<KinesisConfigurationData>,
    /// Tags set from configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Every tag on the stream.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags_all: BTreeMap<String, String>,
}

fn require_field<'a>(field: &str, value: &'a str) -> Result<&'a str, ProviderError> {
    if value.is_empty() {
        Err(ProviderError::Validation(format!("{field} must be set")))
    } else {
        Ok(value)
    }
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            ProviderError::Validation(format!(
                "{field}: '{value}' is not an RFC 3339 timestamp: {e}"
            ))
        })
}

/// Render `remote`, keeping the stored spelling when it names the same instant.
fn format_time(stored: &str, remote: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(stored) {
        Ok(t) if t == remote => stored.to_owned(),
        _ => remote.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

impl StreamData {
    /// Build the create request, checking everything the service would reject.
    pub fn to_request(&self) -> Result<StreamRequest, ProviderError> {
        let kinesis = match self.kinesis_configuration.as_slice() {
            [kinesis] => kinesis,
            [] => {
                return Err(ProviderError::Validation(
                    "kinesis_configuration block is required".to_owned(),
                ));
            }
            _ => {
                return Err(ProviderError::Validation(
                    "at most one kinesis_configuration block is allowed".to_owned(),
                ));
            }
        };

        let inclusive_start_time = parse_time(
            "inclusive_start_time",
            require_field("inclusive_start_time", &self.inclusive_start_time)?,
        )?;
        let exclusive_end_time = self
            .exclusive_end_time
            .as_deref()
            .map(|value| parse_time("exclusive_end_time", value))
            .transpose()?;
        if let Some(end) = exclusive_end_time
            && end <= inclusive_start_time
        {
            return Err(ProviderError::Validation(
                "exclusive_end_time must be after inclusive_start_time".to_owned(),
            ));
        }

        Ok(StreamRequest {
            ledger_name: require_field(LEDGER_NAME, &self.ledger_name)?.to_owned(),
            stream_name: require_field("stream_name", &self.stream_name)?.to_owned(),
            role_arn: require_field("role_arn", &self.role_arn)?.to_owned(),
            inclusive_start_time,
            exclusive_end_time,
            kinesis_configuration: KinesisConfiguration {
                stream_arn: require_field(
                    "kinesis_configuration.0.stream_arn",
                    &kinesis.stream_arn,
                )?
                .to_owned(),
                aggregation_enabled: Some(kinesis.aggregation_enabled),
            },
            tags: self.tags.clone(),
        })
    }

    /// Stored attributes for a described stream.
    ///
    /// Every field except the tags comes from `description`; `stored` only
    /// supplies values the service left out, the original spelling of
    /// unchanged timestamps, and the tags until [`StreamData::with_tags`].
    pub fn from_description(description: &StreamDescription, stored: &StreamData) -> Self {
        let kinesis_configuration = match &description.kinesis_configuration {
            Some(kinesis) => vec![KinesisConfigurationData {
                stream_arn: kinesis.stream_arn.clone(),
                aggregation_enabled: kinesis
                    .aggregation_enabled
                    .unwrap_or_else(default_aggregation),
            }],
            None => stored.kinesis_configuration.clone(),
        };

        Self {
            id: Some(description.stream_id.clone()),
            arn: description.arn.clone().or_else(|| stored.arn.clone()),
            ledger_name: description.ledger_name.clone(),
            stream_name: description.stream_name.clone(),
            role_arn: description.role_arn.clone(),
            inclusive_start_time: description.inclusive_start_time.map_or_else(
                || stored.inclusive_start_time.clone(),
                |t| format_time(&stored.inclusive_start_time, t),
            ),
            exclusive_end_time: description.exclusive_end_time.map(|t| {
                format_time(stored.exclusive_end_time.as_deref().unwrap_or_default(), t)
            }),
            kinesis_configuration,
            tags: stored.tags.clone(),
            tags_all: stored.tags_all.clone(),
        }
    }

    /// Replace both tag maps with the tags listed on the stream.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags.clone_from(&tags);
        self.tags_all = tags;
        self
    }
}

/// How long the stream adapter waits for the service to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimeouts {
    /// Limit for a new stream to become `ACTIVE`.
    pub create: Duration,
    /// Limit for a cancelled stream to disappear.
    pub delete: Duration,
    /// Pause between status checks.
    pub poll_interval: Duration,
}

impl Default for StreamTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(8 * 60),
            delete: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Adapter for QLDB journal streams.
pub struct StreamResource<C> {
    client: C,
    timeouts: StreamTimeouts,
}

impl<C> std::fmt::Debug for StreamResource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResource")
            .field("client", &"<StreamApi>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl<C: StreamApi> StreamResource<C> {
    /// Create a `StreamResource` around a pre-built client.
    pub fn with_client(client: C, timeouts: StreamTimeouts) -> Self {
        Self { client, timeouts }
    }

    /// The injected client.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn timeouts(&self) -> StreamTimeouts {
        self.timeouts
    }

    /// Look up a stream by ledger name and stream id.
    pub async fn find_stream(
        &self,
        ctx: &OperationContext,
        ledger_name: &str,
        stream_id: &str,
    ) -> LookupResult<StreamDescription> {
        match ResourceKey::compound([(LEDGER_NAME, ledger_name), (ID_ATTRIBUTE, stream_id)]) {
            Ok(key) => self.locate(ctx, &key).await,
            Err(err) => LookupResult::TransportError(err.into()),
        }
    }

    /// Fill in the tags listed on the stream.
    ///
    /// `Ok(None)` means the stream disappeared between the describe and the
    /// tag listing.
    async fn with_listed_tags(
        &self,
        ctx: &OperationContext,
        data: StreamData,
    ) -> Result<Option<StreamData>, ProviderError> {
        let Some(arn) = data.arn.clone() else {
            return Ok(Some(data));
        };
        match ctx
            .run("ListTagsForResource", self.client.list_tags_for_resource(&arn))
            .await
        {
            Ok(tags) => Ok(Some(data.with_tags(tags))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Poll until the stream is `ACTIVE`.
    ///
    /// `IMPAIRED` and a not-yet-visible stream keep waiting; any other status
    /// is a failure.
    async fn wait_for_active(
        &self,
        ctx: &OperationContext,
        key: &ResourceKey,
    ) -> Result<StreamDescription, ProviderError> {
        let timeout = self.timeouts.create;
        let deadline = Instant::now() + timeout;
        loop {
            match self.locate(ctx, key).await {
                LookupResult::Found(description) => match description.status {
                    StreamStatus::Active => return Ok(description),
                    StreamStatus::Impaired => {
                        debug!(
                            key = %key,
                            cause = ?description.error_cause,
                            "QLDB stream impaired, waiting"
                        );
                    }
                    status => {
                        let cause = description
                            .error_cause
                            .map(|c| format!(" ({c})"))
                            .unwrap_or_default();
                        return Err(ProviderError::ExecutionFailed(format!(
                            "QLDB stream ({key}) entered status {status}{cause}"
                        )));
                    }
                },
                LookupResult::Absent => debug!(key = %key, "QLDB stream not visible yet"),
                LookupResult::TransportError(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                warn!(key = %key, ?timeout, "QLDB stream did not become active");
                return Err(ProviderError::Timeout(timeout));
            }
            ctx.sleep("wait for QLDB stream to become active", self.timeouts.poll_interval)
                .await?;
        }
    }

    /// Poll until the stream is gone or cancelled.
    async fn wait_for_absent(
        &self,
        ctx: &OperationContext,
        key: &ResourceKey,
    ) -> Result<(), ProviderError> {
        let timeout = self.timeouts.delete;
        let deadline = Instant::now() + timeout;
        loop {
            match self.locate(ctx, key).await {
                LookupResult::Absent => return Ok(()),
                LookupResult::Found(description) => match description.status {
                    StreamStatus::Active | StreamStatus::Impaired => {
                        debug!(
                            key = %key,
                            status = %description.status,
                            "QLDB stream still running, waiting"
                        );
                    }
                    status => {
                        return Err(ProviderError::ExecutionFailed(format!(
                            "QLDB stream ({key}) entered status {status} while cancelling"
                        )));
                    }
                },
                LookupResult::TransportError(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                warn!(key = %key, ?timeout, "QLDB stream was not cancelled in time");
                return Err(ProviderError::Timeout(timeout));
            }
            ctx.sleep("wait for QLDB stream cancellation", self.timeouts.poll_interval)
                .await?;
        }
    }
}

fn key_parts(key: &ResourceKey) -> Result<(&str, &str), ProviderError> {
    match (key.get(LEDGER_NAME), key.get(ID_ATTRIBUTE)) {
        (Some(ledger_name), Some(stream_id)) => Ok((ledger_name, stream_id)),
        _ => Err(ProviderError::Validation(format!(
            "stream key ({key}) must have {LEDGER_NAME} and {ID_ATTRIBUTE} parts"
        ))),
    }
}

impl<C: StreamApi> Locator for StreamResource<C> {
    type Object = StreamDescription;

    /// A `CANCELED` stream is reported as [`LookupResult::Absent`].
    #[instrument(skip_all, fields(key = %key))]
    async fn locate(
        &self,
        ctx: &OperationContext,
        key: &ResourceKey,
    ) -> LookupResult<StreamDescription> {
        let (ledger_name, stream_id) = match key_parts(key) {
            Ok(parts) => parts,
            Err(err) => return LookupResult::TransportError(err),
        };
        let result = ctx
            .run(
                "DescribeJournalKinesisStream",
                self.client
                    .describe_journal_kinesis_stream(ledger_name, stream_id),
            )
            .await;

        match LookupResult::classify(result, key) {
            LookupResult::Found(description) if description.status == StreamStatus::Canceled => {
                debug!(key = %key, "QLDB stream cancelled");
                LookupResult::Absent
            }
            other => other,
        }
    }
}

impl<C: StreamApi> Resource for StreamResource<C> {
    #[allow(clippy::unnecessary_literal_bound)]
    fn type_name(&self) -> &str {
        STREAM_TYPE_NAME
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn display_name(&self) -> &str {
        "QLDB Stream"
    }

    fn schema(&self) -> Schema {
        let kinesis = Block::new()
            .with_attribute(
                "stream_arn",
                Attribute::required_string()
                    .with_description("ARN of the Kinesis Data Streams target"),
            )
            .with_attribute(
                "aggregation_enabled",
                Attribute::optional_bool()
                    .with_default(serde_json::Value::Bool(true))
                    .with_description("Aggregate multiple records into one Kinesis record"),
            )
            .required()
            .requires_replace();

        Schema::v0()
            .with_attribute(
                "arn",
                Attribute::computed_string().with_description("ARN of the stream"),
            )
            .with_attribute(LEDGER_NAME, Attribute::required_string().requires_replace())
            .with_attribute("stream_name", Attribute::required_string().requires_replace())
            .with_attribute("role_arn", Attribute::required_string().requires_replace())
            .with_attribute(
                "inclusive_start_time",
                Attribute::required_string().requires_replace(),
            )
            .with_attribute(
                "exclusive_end_time",
                Attribute::optional_string().requires_replace(),
            )
            .with_attribute(
                "tags",
                Attribute::optional_map().with_description("Tags to assign to the stream"),
            )
            .with_attribute(
                "tags_all",
                Attribute::computed_map().with_description("Every tag on the stream"),
            )
            .with_block("kinesis_configuration", kinesis)
    }

    fn key(&self, state: &ResourceState) -> Result<ResourceKey, ProviderError> {
        Ok(ResourceKey::compound([
            (LEDGER_NAME, state.string(LEDGER_NAME).unwrap_or_default()),
            (ID_ATTRIBUTE, state.id().unwrap_or_default()),
        ])?)
    }

    fn label(&self, state: &ResourceState) -> String {
        self.key(state).map_or_else(
            |_| state.string("stream_name").unwrap_or("<unknown>").to_owned(),
            |key| key.to_string(),
        )
    }

    #[instrument(skip_all, fields(resource = STREAM_TYPE_NAME))]
    async fn create(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        state: &mut ResourceState,
    ) -> Result<(), ProviderError> {
        let mut data: StreamData = plan.data()?;
        data.tags_all.clear();
        let request = data.to_request()?;

        debug!(
            ledger = %request.ledger_name,
            stream_name = %request.stream_name,
            "starting QLDB journal stream"
        );
        let stream_id = ctx
            .run(
                "StreamJournalToKinesis",
                self.client.stream_journal_to_kinesis(&request),
            )
            .await?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::EmptyResult(format!(
                    "StreamJournalToKinesis for {} returned no stream id",
                    request.stream_name
                ))
            })?;

        data.id = Some(stream_id.clone());
        state.set_data(&data)?;
        info!(ledger = %request.ledger_name, stream_id = %stream_id, "QLDB stream started");

        let key = self.key(state)?;
        let description = self.wait_for_active(ctx, &key).await?;
        let refreshed = self
            .with_listed_tags(ctx, StreamData::from_description(&description, &data))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("QLDB stream ({key}) vanished after activation"))
            })?;
        state.set_data(&refreshed)?;
        Ok(())
    }

    #[instrument(skip_all, fields(resource = STREAM_TYPE_NAME))]
    async fn read(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<ReadOutcome, ProviderError> {
        let stored: StreamData = state.data()?;
        let key = self.key(state)?;
        let description = match self.locate(ctx, &key).await {
            LookupResult::Found(description) => description,
            LookupResult::Absent => return Ok(ReadOutcome::Removed { key }),
            LookupResult::TransportError(err) => return Err(err),
        };

        let data = StreamData::from_description(&description, &stored);
        match self.with_listed_tags(ctx, data).await? {
            Some(data) => Ok(ReadOutcome::Refreshed(ResourceState::from_data(
                STREAM_TYPE_NAME,
                &data,
            )?)),
            None => Ok(ReadOutcome::Removed { key }),
        }
    }

    /// Tags are the only in-place change; everything else forces replacement.
    #[instrument(skip_all, fields(resource = STREAM_TYPE_NAME))]
    async fn update(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        prior: &ResourceState,
    ) -> Result<ResourceState, ProviderError> {
        let planned: StreamData = plan.data()?;
        let stored: StreamData = prior.data()?;

        if planned.tags != stored.tags_all {
            let key = self.key(prior)?;
            let arn = stored.arn.as_deref().ok_or_else(|| {
                ProviderError::Validation(format!("QLDB stream ({key}) has no arn to tag"))
            })?;
            let (changed, removed) = tag_changes(&stored.tags_all, &planned.tags);

            if !removed.is_empty() {
                debug!(key = %key, tags = ?removed, "removing QLDB stream tags");
                ctx.run("UntagResource", self.client.untag_resource(arn, &removed))
                    .await?;
            }
            if !changed.is_empty() {
                debug!(key = %key, tags = ?changed.keys(), "setting QLDB stream tags");
                ctx.run("TagResource", self.client.tag_resource(arn, &changed))
                    .await?;
            }
        }

        match self.read(ctx, prior).await? {
            ReadOutcome::Refreshed(state) => Ok(state),
            ReadOutcome::Removed { key } => Err(ProviderError::NotFound(format!(
                "QLDB stream ({key}) disappeared during update"
            ))),
        }
    }

    #[instrument(skip_all, fields(resource = STREAM_TYPE_NAME))]
    async fn delete(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<(), ProviderError> {
        let key = self.key(state)?;
        let (ledger_name, stream_id) = key_parts(&key)?;

        debug!(key = %key, "cancelling QLDB journal stream");
        match ctx
            .run(
                "CancelJournalKinesisStream",
                self.client
                    .cancel_journal_kinesis_stream(ledger_name, stream_id),
            )
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(key = %key, "QLDB stream already gone");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        self.wait_for_absent(ctx, &key).await
    }

    fn import_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        let key = ResourceKey::parse(id, &[LEDGER_NAME, ID_ATTRIBUTE])?;
        let (ledger_name, stream_id) = key_parts(&key)?;
        let data = StreamData {
            id: Some(stream_id.to_owned()),
            ledger_name: ledger_name.to_owned(),
            ..StreamData::default()
        };
        Ok(ResourceState::from_data(STREAM_TYPE_NAME, &data)?)
    }
}

/// Tags to set (new or changed values) and tag keys to remove.
fn tag_changes(
    current: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let changed = desired
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let removed = current
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .cloned()
        .collect();
    (changed, removed)
}

#[cfg(feature = "qldb")]
mod sdk {
    use std::collections::{BTreeMap, HashMap};

    use aws_sdk_qldb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
    use aws_sdk_qldb::primitives::DateTime as SdkDateTime;
    use aws_sdk_qldb::types;
    use chrono::{DateTime, Utc};
    use drift_provider::ProviderError;

    use super::{
        KinesisConfiguration, RESOURCE_NOT_FOUND, StreamApi, StreamDescription, StreamRequest,
        StreamResource, StreamStatus, StreamTimeouts,
    };
    use crate::auth::build_sdk_config;
    use crate::config::AwsBaseConfig;
    use crate::error::{SdkFailure, classify_sdk_failure};

    fn sdk_error<E>(err: &SdkError<E>) -> ProviderError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let failure = match err {
            SdkError::ConstructionFailure(_) => SdkFailure::Construction,
            SdkError::TimeoutError(_) => SdkFailure::Timeout,
            SdkError::DispatchFailure(_) => SdkFailure::Dispatch,
            SdkError::ResponseError(_) => SdkFailure::Response,
            _ => SdkFailure::Service,
        };
        let detail = DisplayErrorContext(err).to_string();
        classify_sdk_failure(failure, err.code(), &detail, &[RESOURCE_NOT_FOUND]).into()
    }

    // Accepts both required (`&T`) and optional (`Option<&T>`) SDK getters.
    fn optional<'a, T: ?Sized>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
        value.into()
    }

    fn owned(value: Option<&str>) -> String {
        value.unwrap_or_default().to_owned()
    }

    /// Tag values are plain strings in some SDK shapes and optional in others.
    trait TagValue {
        fn to_value(&self) -> String;
    }

    impl TagValue for String {
        fn to_value(&self) -> String {
            self.clone()
        }
    }

    impl TagValue for Option<String> {
        fn to_value(&self) -> String {
            self.clone().unwrap_or_default()
        }
    }

    fn tag_map<V: TagValue>(tags: Option<&HashMap<String, V>>) -> BTreeMap<String, String> {
        tags.into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect()
    }

    fn to_sdk_time(time: DateTime<Utc>) -> SdkDateTime {
        SdkDateTime::from_secs_and_nanos(time.timestamp(), time.timestamp_subsec_nanos())
    }

    fn from_sdk_time(time: &SdkDateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(time.secs(), time.subsec_nanos())
    }

    fn describe(stream: &types::JournalKinesisStreamDescription) -> StreamDescription {
        StreamDescription {
            arn: optional::<str>(stream.arn()).map(str::to_owned),
            ledger_name: owned(optional::<str>(stream.ledger_name())),
            stream_id: owned(optional::<str>(stream.stream_id())),
            stream_name: owned(optional::<str>(stream.stream_name())),
            role_arn: owned(optional::<str>(stream.role_arn())),
            status: optional::<types::StreamStatus>(stream.status())
                .map_or(StreamStatus::Unknown, |status| StreamStatus::from(status.as_str())),
            creation_time: optional::<SdkDateTime>(stream.creation_time())
                .and_then(from_sdk_time),
            inclusive_start_time: optional::<SdkDateTime>(stream.inclusive_start_time())
                .and_then(from_sdk_time),
            exclusive_end_time: optional::<SdkDateTime>(stream.exclusive_end_time())
                .and_then(from_sdk_time),
            kinesis_configuration: optional::<types::KinesisConfiguration>(
                stream.kinesis_configuration(),
            )
            .map(|kinesis| KinesisConfiguration {
                stream_arn: owned(optional::<str>(kinesis.stream_arn())),
                aggregation_enabled: kinesis.aggregation_enabled(),
            }),
            error_cause: optional::<types::ErrorCause>(stream.error_cause())
                .map(|cause| cause.as_str().to_owned()),
        }
    }

    impl StreamApi for aws_sdk_qldb::Client {
        async fn stream_journal_to_kinesis(
            &self,
            request: &StreamRequest,
        ) -> Result<Option<String>, ProviderError> {
            let kinesis = types::KinesisConfiguration::builder()
                .stream_arn(&request.kinesis_configuration.stream_arn)
                .set_aggregation_enabled(request.kinesis_configuration.aggregation_enabled)
                .build()
                .map_err(|e| ProviderError::Validation(e.to_string()))?;

            let output = aws_sdk_qldb::Client::stream_journal_to_kinesis(self)
                .ledger_name(&request.ledger_name)
                .stream_name(&request.stream_name)
                .role_arn(&request.role_arn)
                .inclusive_start_time(to_sdk_time(request.inclusive_start_time))
                .set_exclusive_end_time(request.exclusive_end_time.map(to_sdk_time))
                .kinesis_configuration(kinesis)
                .set_tags((!request.tags.is_empty()).then(|| {
                    request
                        .tags
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone().into()))
                        .collect()
                }))
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(optional::<str>(output.stream_id()).map(str::to_owned))
        }

        async fn describe_journal_kinesis_stream(
            &self,
            ledger_name: &str,
            stream_id: &str,
        ) -> Result<Option<StreamDescription>, ProviderError> {
            let output = aws_sdk_qldb::Client::describe_journal_kinesis_stream(self)
                .ledger_name(ledger_name)
                .stream_id(stream_id)
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(optional::<types::JournalKinesisStreamDescription>(output.stream())
                .map(describe))
        }

        async fn cancel_journal_kinesis_stream(
            &self,
            ledger_name: &str,
            stream_id: &str,
        ) -> Result<(), ProviderError> {
            aws_sdk_qldb::Client::cancel_journal_kinesis_stream(self)
                .ledger_name(ledger_name)
                .stream_id(stream_id)
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(())
        }

        async fn tag_resource(
            &self,
            arn: &str,
            tags: &BTreeMap<String, String>,
        ) -> Result<(), ProviderError> {
            aws_sdk_qldb::Client::tag_resource(self)
                .resource_arn(arn)
                .set_tags(Some(
                    tags.iter()
                        .map(|(k, v)| (k.clone(), v.clone().into()))
                        .collect(),
                ))
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(())
        }

        async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<(), ProviderError> {
            aws_sdk_qldb::Client::untag_resource(self)
                .resource_arn(arn)
                .set_tag_keys(Some(keys.to_vec()))
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(())
        }

        async fn list_tags_for_resource(
            &self,
            arn: &str,
        ) -> Result<BTreeMap<String, String>, ProviderError> {
            let output = aws_sdk_qldb::Client::list_tags_for_resource(self)
                .resource_arn(arn)
                .send()
                .await
                .map_err(|e| sdk_error(&e))?;
            Ok(tag_map(output.tags()))
        }
    }

    impl StreamResource<aws_sdk_qldb::Client> {
        /// Create a `StreamResource` by building an AWS SDK client.
        pub async fn new(config: &AwsBaseConfig, timeouts: StreamTimeouts) -> Self {
            let sdk_config = build_sdk_config(config).await;
            Self::from_sdk_config(&sdk_config, timeouts)
        }

        /// Create a `StreamResource` from an already-loaded SDK config.
        pub fn from_sdk_config(
            sdk_config: &aws_config::SdkConfig,
            timeouts: StreamTimeouts,
        ) -> Self {
            Self::with_client(aws_sdk_qldb::Client::new(sdk_config), timeouts)
        }
    }

}
