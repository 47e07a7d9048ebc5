//! In-memory implementations of the AWS API seams.
//!
//! They behave like the real services closely enough to drive the adapters
//! end to end without network access: missing objects answer with
//! [`ProviderError::NotFound`], every call is recorded by operation name, and
//! failures or empty payloads can be scripted per operation. Useful for local
//! development and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use drift_provider::ProviderError;

use crate::qldb::{StreamApi, StreamDescription, StreamRequest, StreamStatus};
use crate::simpledb::{DomainApi, DomainMetadata};

/// Call log plus scripted failures, shared by both fakes.
#[derive(Debug, Default)]
struct Script {
    calls: Vec<String>,
    failures: Vec<(String, ProviderError)>,
}

impl Script {
    /// Record a call and pop the first failure scripted for it.
    fn record(&mut self, operation: &str) -> Result<(), ProviderError> {
        self.calls.push(operation.to_owned());
        match self.failures.iter().position(|(op, _)| op == operation) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SimpleDbState {
    script: Script,
    domains: BTreeMap<String, DomainMetadata>,
    empty_metadata: bool,
}

/// In-memory `SimpleDB`.
///
/// Unlike the real service, deleting a domain that does not exist answers
/// `NotFound`, so callers see the same outcome either way.
#[derive(Debug, Default)]
pub struct MemorySimpleDb {
    state: Mutex<SimpleDbState>,
}

impl MemorySimpleDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing domain.
    #[must_use]
    pub fn with_domain(self, name: impl Into<String>) -> Self {
        self.insert_domain(name);
        self
    }

    /// Create a domain out of band.
    pub fn insert_domain(&self, name: impl Into<String>) {
        lock(&self.state)
            .domains
            .entry(name.into())
            .or_insert_with(|| DomainMetadata {
                item_count: Some(0),
                attribute_name_count: Some(0),
                attribute_value_count: Some(0),
                timestamp: i32::try_from(Utc::now().timestamp()).ok(),
                ..DomainMetadata::default()
            });
    }

    /// Delete a domain out of band.
    pub fn remove_domain(&self, name: &str) -> bool {
        lock(&self.state).domains.remove(name).is_some()
    }

    pub fn has_domain(&self, name: &str) -> bool {
        lock(&self.state).domains.contains_key(name)
    }

    /// Make the next call to `operation` fail with `err`.
    pub fn fail_next(&self, operation: &str, err: ProviderError) {
        lock(&self.state)
            .script
            .failures
            .push((operation.to_owned(), err));
    }

    /// Make `DomainMetadata` succeed without a payload.
    pub fn return_empty_metadata(&self, empty: bool) {
        lock(&self.state).empty_metadata = empty;
    }

    /// Operation names of every call so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).script.calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.state)
            .script
            .calls
            .iter()
            .filter(|op| *op == operation)
            .count()
    }
}

fn no_such_domain(name: &str) -> ProviderError {
    ProviderError::NotFound(format!(
        "NoSuchDomain: The specified domain does not exist. ({name})"
    ))
}

impl DomainApi for MemorySimpleDb {
    async fn create_domain(&self, name: &str) -> Result<(), ProviderError> {
        lock(&self.state).script.record("CreateDomain")?;
        self.insert_domain(name);
        Ok(())
    }

    async fn domain_metadata(&self, name: &str) -> Result<Option<DomainMetadata>, ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("DomainMetadata")?;
        let metadata = state
            .domains
            .get(name)
            .cloned()
            .ok_or_else(|| no_such_domain(name))?;
        Ok((!state.empty_metadata).then_some(metadata))
    }

    async fn delete_domain(&self, name: &str) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("DeleteDomain")?;
        state
            .domains
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| no_such_domain(name))
    }
}

#[derive(Debug, Default)]
struct QldbState {
    script: Script,
    ledgers: Vec<String>,
    streams: BTreeMap<(String, String), StreamDescription>,
    /// Tags by resource ARN.
    tags: BTreeMap<String, BTreeMap<String, String>>,
    /// Describe calls left before a stream reports `ACTIVE`.
    warmup: BTreeMap<(String, String), u32>,
    activation_polls: u32,
    next_id: u64,
    empty_describe: bool,
    empty_create: bool,
}

/// In-memory QLDB journal streaming.
///
/// Streams can only be created on seeded ledgers. A new stream reports
/// `IMPAIRED` for a configurable number of describe calls before turning
/// `ACTIVE`; cancelling marks it `CANCELED`. Tags stay readable until the
/// stream is purged.
#[derive(Debug, Default)]
pub struct MemoryQldb {
    state: Mutex<QldbState>,
}

impl MemoryQldb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger that streams can be created on.
    #[must_use]
    pub fn with_ledger(self, name: impl Into<String>) -> Self {
        lock(&self.state).ledgers.push(name.into());
        self
    }

    /// Number of describe calls a new stream stays `IMPAIRED` for.
    #[must_use]
    pub fn with_activation_polls(self, polls: u32) -> Self {
        lock(&self.state).activation_polls = polls;
        self
    }

    /// The stored description of a stream, bypassing the call log.
    pub fn stream(&self, ledger_name: &str, stream_id: &str) -> Option<StreamDescription> {
        lock(&self.state)
            .streams
            .get(&(ledger_name.to_owned(), stream_id.to_owned()))
            .cloned()
    }

    /// Force a stream into `status`.
    pub fn set_status(&self, ledger_name: &str, stream_id: &str, status: StreamStatus) {
        if let Some(stream) = lock(&self.state)
            .streams
            .get_mut(&(ledger_name.to_owned(), stream_id.to_owned()))
        {
            stream.status = status;
        }
    }

    /// Purge a stream and its tags out of band.
    pub fn remove_stream(&self, ledger_name: &str, stream_id: &str) -> bool {
        let mut state = lock(&self.state);
        let removed = state
            .streams
            .remove(&(ledger_name.to_owned(), stream_id.to_owned()));
        if let Some(arn) = removed.as_ref().and_then(|s| s.arn.as_ref()) {
            state.tags.remove(arn);
        }
        removed.is_some()
    }

    /// Tags on the resource named by `arn`, bypassing the call log.
    pub fn tags(&self, arn: &str) -> Option<BTreeMap<String, String>> {
        lock(&self.state).tags.get(arn).cloned()
    }

    /// Make the next call to `operation` fail with `err`.
    pub fn fail_next(&self, operation: &str, err: ProviderError) {
        lock(&self.state)
            .script
            .failures
            .push((operation.to_owned(), err));
    }

    /// Make `DescribeJournalKinesisStream` succeed without a stream.
    pub fn return_empty_describe(&self, empty: bool) {
        lock(&self.state).empty_describe = empty;
    }

    /// Make `StreamJournalToKinesis` succeed without a stream id.
    pub fn return_empty_create(&self, empty: bool) {
        lock(&self.state).empty_create = empty;
    }

    /// Operation names of every call so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).script.calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.state)
            .script
            .calls
            .iter()
            .filter(|op| *op == operation)
            .count()
    }
}

fn stream_not_found(ledger_name: &str, stream_id: &str) -> ProviderError {
    ProviderError::NotFound(format!(
        "ResourceNotFoundException: stream {stream_id} not found on ledger {ledger_name}"
    ))
}

fn arn_not_found(arn: &str) -> ProviderError {
    ProviderError::NotFound(format!("ResourceNotFoundException: no resource with arn {arn}"))
}

impl StreamApi for MemoryQldb {
    async fn stream_journal_to_kinesis(
        &self,
        request: &StreamRequest,
    ) -> Result<Option<String>, ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("StreamJournalToKinesis")?;
        if !state.ledgers.contains(&request.ledger_name) {
            return Err(ProviderError::NotFound(format!(
                "ResourceNotFoundException: ledger {} not found",
                request.ledger_name
            )));
        }
        if state.empty_create {
            return Ok(None);
        }

        state.next_id += 1;
        let stream_id = format!("{:0>22}", state.next_id);
        let description = StreamDescription {
            arn: Some(format!(
                "arn:aws:qldb:us-east-1:123456789012:stream/{}/{stream_id}",
                request.ledger_name
            )),
            ledger_name: request.ledger_name.clone(),
            stream_id: stream_id.clone(),
            stream_name: request.stream_name.clone(),
            role_arn: request.role_arn.clone(),
            status: StreamStatus::Active,
            creation_time: Some(Utc::now()),
            inclusive_start_time: Some(request.inclusive_start_time),
            exclusive_end_time: request.exclusive_end_time,
            kinesis_configuration: Some(request.kinesis_configuration.clone()),
            error_cause: None,
        };
        let arn = description.arn.clone().unwrap_or_default();
        state.tags.insert(arn, request.tags.clone());
        let key = (request.ledger_name.clone(), stream_id.clone());
        if state.activation_polls > 0 {
            let polls = state.activation_polls;
            state.warmup.insert(key.clone(), polls);
        }
        state.streams.insert(key, description);
        Ok(Some(stream_id))
    }

    async fn describe_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> Result<Option<StreamDescription>, ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("DescribeJournalKinesisStream")?;
        let key = (ledger_name.to_owned(), stream_id.to_owned());
        let mut description = state
            .streams
            .get(&key)
            .cloned()
            .ok_or_else(|| stream_not_found(ledger_name, stream_id))?;

        if let Some(remaining) = state.warmup.get_mut(&key) {
            if *remaining > 0 && description.status == StreamStatus::Active {
                *remaining -= 1;
                description.status = StreamStatus::Impaired;
            } else {
                state.warmup.remove(&key);
            }
        }

        Ok((!state.empty_describe).then_some(description))
    }

    async fn cancel_journal_kinesis_stream(
        &self,
        ledger_name: &str,
        stream_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("CancelJournalKinesisStream")?;
        let key = (ledger_name.to_owned(), stream_id.to_owned());
        let stream = state
            .streams
            .get_mut(&key)
            .ok_or_else(|| stream_not_found(ledger_name, stream_id))?;
        stream.status = StreamStatus::Canceled;
        state.warmup.remove(&key);
        Ok(())
    }

    async fn tag_resource(
        &self,
        arn: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("TagResource")?;
        let current = state.tags.get_mut(arn).ok_or_else(|| arn_not_found(arn))?;
        current.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("UntagResource")?;
        let current = state.tags.get_mut(arn).ok_or_else(|| arn_not_found(arn))?;
        current.retain(|k, _| !keys.contains(k));
        Ok(())
    }

    async fn list_tags_for_resource(
        &self,
        arn: &str,
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let mut state = lock(&self.state);
        state.script.record("ListTagsForResource")?;
        state.tags.get(arn).cloned().ok_or_else(|| arn_not_found(arn))
    }
}
