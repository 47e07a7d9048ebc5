//! End-to-end scenarios for `aws_qldb_stream` through the registry.

use std::sync::Arc;
use std::time::Duration;

use drift_aws::memory::MemoryQldb;
use drift_aws::qldb::StreamStatus;
use drift_aws::{STREAM_TYPE_NAME, StreamResource, StreamTimeouts};
use drift_core::{Lifecycle, ResourceState};
use drift_provider::{
    Locator, LookupResult, ManagedResource, OperationContext, ProviderError, ResourceRegistry,
};
use serde_json::json;

const ROLE: &str = "arn:aws:iam::123456789012:role/qldb-stream";
const SINK: &str = "arn:aws:kinesis:us-east-1:123456789012:stream/journal-sink";

fn timeouts() -> StreamTimeouts {
    StreamTimeouts {
        create: Duration::from_secs(120),
        delete: Duration::from_secs(60),
        poll_interval: Duration::from_secs(10),
    }
}

fn setup(qldb: MemoryQldb) -> (Arc<MemoryQldb>, ResourceRegistry) {
    let qldb = Arc::new(qldb);
    let mut registry = ResourceRegistry::new();
    registry
        .register(Arc::new(StreamResource::with_client(Arc::clone(&qldb), timeouts())))
        .unwrap();
    (qldb, registry)
}

fn plan() -> ResourceState {
    ResourceState::new(STREAM_TYPE_NAME)
        .with_attribute("ledger_name", json!("books"))
        .with_attribute("stream_name", json!("journal"))
        .with_attribute("role_arn", json!(ROLE))
        .with_attribute("inclusive_start_time", json!("2021-01-01T00:00:00Z"))
        .with_attribute("kinesis_configuration", json!([{"stream_arn": SINK}]))
}

async fn create(registry: &ResourceRegistry) -> ManagedResource {
    let mut stream = ManagedResource::new(STREAM_TYPE_NAME);
    stream.plan(plan()).unwrap();
    let diags = stream.create(registry, &OperationContext::new()).await.unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    stream
}

#[tokio::test(start_paused = true)]
async fn stream_lifecycle() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books").with_activation_polls(1));
    let ctx = OperationContext::new();
    let mut stream = create(&registry).await;

    assert_eq!(stream.lifecycle(), Lifecycle::Created);
    let state = stream.state().unwrap().clone();
    let id = state.id().unwrap().to_owned();
    assert_eq!(
        state.string("arn"),
        Some(format!("arn:aws:qldb:us-east-1:123456789012:stream/books/{id}").as_str())
    );
    assert_eq!(
        state.attribute("kinesis_configuration"),
        Some(&json!([{"stream_arn": SINK, "aggregation_enabled": true}]))
    );
    assert!(state.attribute("exclusive_end_time").is_none());

    // A refresh right after create reproduces the same record.
    stream.refresh(&registry, &ctx).await.unwrap();
    assert_eq!(stream.state(), Some(&state));

    let diags = stream.destroy(&registry, &ctx).await.unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(stream.lifecycle(), Lifecycle::Deleted);
    assert_eq!(qldb.stream("books", &id).unwrap().status, StreamStatus::Canceled);
}

#[tokio::test]
async fn located_descriptor_matches_service() {
    let qldb = Arc::new(MemoryQldb::new().with_ledger("books"));
    let streams = StreamResource::with_client(Arc::clone(&qldb), timeouts());
    let mut state = ResourceState::new(STREAM_TYPE_NAME);
    let mut planned = plan();
    planned.set_attribute(
        "kinesis_configuration",
        json!([{"stream_arn": SINK, "aggregation_enabled": false}]),
    );
    drift_provider::Resource::create(&streams, &OperationContext::new(), &planned, &mut state)
        .await
        .unwrap();
    let id = state.id().unwrap();

    let found = streams.find_stream(&OperationContext::new(), "books", id).await;
    match found {
        LookupResult::Found(description) => {
            assert_eq!(Some(description), qldb.stream("books", id));
        }
        other => panic!("expected the stream, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_stream_is_absent() {
    let streams = StreamResource::with_client(MemoryQldb::new().with_ledger("books"), timeouts());
    let key = drift_core::ResourceKey::parse("books,0000000000000000000042", &["ledger_name", "id"])
        .unwrap();

    assert!(streams.locate(&OperationContext::new(), &key).await.is_absent());
    assert_eq!(streams.client().calls(), vec!["DescribeJournalKinesisStream"]);
}

#[tokio::test]
async fn import_then_read_fills_state() {
    let (_qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let created = create(&registry).await;
    let created_state = created.state().unwrap().clone();
    let import_id = format!("books,{}", created_state.id().unwrap());

    let mut imported = ManagedResource::new(STREAM_TYPE_NAME);
    imported.import(&registry, &import_id).unwrap();
    assert_eq!(imported.lifecycle(), Lifecycle::Created);

    let diags = imported
        .refresh(&registry, &OperationContext::new())
        .await
        .unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(imported.state(), Some(&created_state));
}

#[tokio::test]
async fn malformed_import_id_is_rejected() {
    let (qldb, registry) = setup(MemoryQldb::new());
    let resp = registry.import_state(STREAM_TYPE_NAME, "0000000000000000000042");

    assert!(resp.state.is_none());
    let error = resp.diagnostics.errors().next().unwrap();
    assert!(error.detail.contains("ledger_name,id"));
    assert!(qldb.calls().is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let ctx = OperationContext::new();
    let stream = create(&registry).await;
    let state = stream.state().unwrap().clone();

    assert!(!registry.delete(&ctx, state.clone()).await.has_error());
    assert!(!registry.delete(&ctx, state.clone()).await.has_error());

    qldb.remove_stream("books", state.id().unwrap());
    assert!(!registry.delete(&ctx, state).await.has_error());
    assert_eq!(qldb.call_count("CancelJournalKinesisStream"), 3);
}

#[tokio::test]
async fn cancelled_stream_is_dropped_on_read() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let mut stream = create(&registry).await;
    let id = stream.state().unwrap().id().unwrap().to_owned();
    qldb.set_status("books", &id, StreamStatus::Canceled);

    let diags = stream
        .refresh(&registry, &OperationContext::new())
        .await
        .unwrap();

    assert_eq!(stream.lifecycle(), Lifecycle::Stale);
    assert!(!diags.has_error());
    assert_eq!(diags.warnings().count(), 1);
}

#[tokio::test]
async fn read_errors_keep_state() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let mut stream = create(&registry).await;
    let before = stream.state().unwrap().clone();
    qldb.fail_next("DescribeJournalKinesisStream", ProviderError::RateLimited);

    let diags = stream
        .refresh(&registry, &OperationContext::new())
        .await
        .unwrap();

    let error = diags.errors().next().unwrap();
    assert_eq!(
        error.summary,
        format!("reading QLDB Stream (books,{})", before.id().unwrap())
    );
    assert_eq!(error.detail, "rate limited");
    assert_eq!(stream.state(), Some(&before));
    assert_eq!(stream.lifecycle(), Lifecycle::Created);
}

#[tokio::test(start_paused = true)]
async fn slow_activation_returns_partial_state() {
    let (_qldb, registry) = setup(
        MemoryQldb::new()
            .with_ledger("books")
            .with_activation_polls(100),
    );
    let mut stream = ManagedResource::new(STREAM_TYPE_NAME);
    stream.plan(plan()).unwrap();

    let diags = stream
        .create(&registry, &OperationContext::new())
        .await
        .unwrap();

    assert!(diags.has_error());
    assert!(diags.errors().next().unwrap().detail.starts_with("timeout after"));
    // The stream exists remotely, so its key is tracked.
    assert_eq!(stream.lifecycle(), Lifecycle::Created);
    let state = stream.state().unwrap();
    assert!(state.id().is_some());
    assert_eq!(state.string("ledger_name"), Some("books"));
}

#[tokio::test]
async fn plan_without_kinesis_block_is_rejected() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let mut planned = plan();
    planned.attributes.remove("kinesis_configuration");

    let resp = registry.create(&OperationContext::new(), planned).await;

    assert!(resp.has_error());
    assert!(
        resp.diagnostics
            .errors()
            .any(|d| d.detail.contains("kinesis_configuration"))
    );
    assert!(qldb.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn operation_deadline_bounds_the_waiter() {
    let (_qldb, registry) = setup(
        MemoryQldb::new()
            .with_ledger("books")
            .with_activation_polls(100),
    );
    let ctx = OperationContext::new().with_timeout(Duration::from_secs(25));

    let resp = registry.create(&ctx, plan()).await;

    let error = resp.diagnostics.errors().next().unwrap();
    assert_eq!(error.detail, format!("timeout after {:?}", Duration::from_secs(25)));
    assert!(resp.state.unwrap().id().is_some());
}

#[tokio::test]
async fn unchanged_plan_updates_without_warnings() {
    let (_qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let ctx = OperationContext::new();
    // The plan leaves aggregation_enabled to its default.
    let created = registry.create(&ctx, plan()).await.state.unwrap();

    let resp = registry.update(&ctx, plan(), created.clone()).await;

    assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
    assert_eq!(resp.state, Some(created));
}

#[tokio::test]
async fn tags_change_in_place() {
    let (qldb, registry) = setup(MemoryQldb::new().with_ledger("books"));
    let ctx = OperationContext::new();
    let mut stream = ManagedResource::new(STREAM_TYPE_NAME);
    stream
        .plan(plan().with_attribute("tags", json!({"env": "test"})))
        .unwrap();
    stream.create(&registry, &ctx).await.unwrap();
    let before = stream.state().unwrap().clone();

    let diags = stream
        .update(
            &registry,
            &ctx,
            plan().with_attribute("tags", json!({"env": "prod", "team": "ledger"})),
        )
        .await
        .unwrap();

    assert!(diags.is_empty(), "{diags:?}");
    let after = stream.state().unwrap();
    assert_eq!(after.id(), before.id());
    assert_eq!(
        after.attribute("tags"),
        Some(&json!({"env": "prod", "team": "ledger"}))
    );
    let arn = after.string("arn").unwrap();
    assert_eq!(qldb.tags(arn).unwrap().len(), 2);
    assert_eq!(qldb.call_count("StreamJournalToKinesis"), 1);
}
