//! `aws_simpledb_domain`: a `SimpleDB` domain addressed by its name.

use std::future::Future;
use std::sync::Arc;

use drift_core::{Attribute, ID_ATTRIBUTE, ResourceKey, ResourceState, Schema};
use drift_provider::{
    Locator, LookupResult, OperationContext, ProviderError, ReadOutcome, Resource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Resource type name of the domain adapter.
pub const DOMAIN_TYPE_NAME: &str = "aws_simpledb_domain";

/// Service error code for a domain that does not exist.
pub const NO_SUCH_DOMAIN: &str = "NoSuchDomain";

/// Domain statistics returned by `DomainMetadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMetadata {
    pub item_count: Option<i32>,
    pub item_names_size_bytes: Option<i64>,
    pub attribute_name_count: Option<i32>,
    pub attribute_name_size_bytes: Option<i64>,
    pub attribute_value_count: Option<i32>,
    pub attribute_value_size_bytes: Option<i64>,
    /// Unix time the metadata was computed.
    pub timestamp: Option<i32>,
}

/// The `SimpleDB` calls the domain adapter needs.
///
/// `domain_metadata` returns `Ok(None)` when the call succeeded without a
/// payload. A missing domain is `Err(ProviderError::NotFound)`.
pub trait DomainApi: Send + Sync {
    fn create_domain(&self, name: &str) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn domain_metadata(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<DomainMetadata>, ProviderError>> + Send;

    fn delete_domain(&self, name: &str) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

impl<T: DomainApi> DomainApi for Arc<T> {
    fn create_domain(&self, name: &str) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).create_domain(name)
    }

    fn domain_metadata(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<DomainMetadata>, ProviderError>> + Send {
        (**self).domain_metadata(name)
    }

    fn delete_domain(&self, name: &str) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).delete_domain(name)
    }
}

/// Stored attributes of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// Adapter for `SimpleDB` domains.
pub struct DomainResource<C> {
    client: C,
}

impl<C> std::fmt::Debug for DomainResource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResource")
            .field("client", &"<DomainApi>")
            .finish()
    }
}

impl<C: DomainApi> DomainResource<C> {
    /// Create a `DomainResource` around a pre-built client.
    pub fn with_client(client: C) -> Self {
        Self { client }
    }

    /// The injected client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Look up a domain by name.
    pub async fn find_domain_by_name(
        &self,
        ctx: &OperationContext,
        name: &str,
    ) -> LookupResult<DomainMetadata> {
        match ResourceKey::single(ID_ATTRIBUTE, name) {
            Ok(key) => self.locate(ctx, &key).await,
            Err(err) => LookupResult::TransportError(err.into()),
        }
    }
}

impl<C: DomainApi> Locator for DomainResource<C> {
    type Object = DomainMetadata;

    #[instrument(skip_all, fields(key = %key))]
    async fn locate(
        &self,
        ctx: &OperationContext,
        key: &ResourceKey,
    ) -> LookupResult<DomainMetadata> {
        let Some(name) = key.get(ID_ATTRIBUTE) else {
            return LookupResult::TransportError(ProviderError::Validation(format!(
                "domain key ({key}) has no {ID_ATTRIBUTE} part"
            )));
        };
        let result = ctx
            .run("DomainMetadata", self.client.domain_metadata(name))
            .await;
        LookupResult::classify(result, key)
    }
}

impl<C: DomainApi> Resource for DomainResource<C> {
    #[allow(clippy::unnecessary_literal_bound)]
    fn type_name(&self) -> &str {
        DOMAIN_TYPE_NAME
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn display_name(&self) -> &str {
        "SimpleDB Domain"
    }

    fn schema(&self) -> Schema {
        Schema::v0().with_attribute(
            "name",
            Attribute::required_string()
                .requires_replace()
                .with_description("Name of the SimpleDB domain"),
        )
    }

    fn key(&self, state: &ResourceState) -> Result<ResourceKey, ProviderError> {
        let id = state.id().ok_or_else(|| {
            ProviderError::Validation("SimpleDB domain record has no id".to_owned())
        })?;
        Ok(ResourceKey::single(ID_ATTRIBUTE, id)?)
    }

    #[instrument(skip_all, fields(resource = DOMAIN_TYPE_NAME))]
    async fn create(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        state: &mut ResourceState,
    ) -> Result<(), ProviderError> {
        let mut data: DomainData = plan.data()?;
        if data.name.is_empty() {
            return Err(ProviderError::Validation("name must not be empty".to_owned()));
        }

        debug!(name = %data.name, "creating SimpleDB domain");
        ctx.run("CreateDomain", self.client.create_domain(&data.name))
            .await?;

        data.id = Some(data.name.clone());
        state.set_data(&data)?;
        info!(name = %data.name, "SimpleDB domain created");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = DOMAIN_TYPE_NAME))]
    async fn read(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<ReadOutcome, ProviderError> {
        let key = self.key(state)?;
        match self.locate(ctx, &key).await {
            LookupResult::Found(metadata) => {
                debug!(key = %key, items = ?metadata.item_count, "SimpleDB domain found");
                let id = key.to_string();
                let data = DomainData {
                    name: id.clone(),
                    id: Some(id),
                };
                Ok(ReadOutcome::Refreshed(ResourceState::from_data(
                    DOMAIN_TYPE_NAME,
                    &data,
                )?))
            }
            LookupResult::Absent => Ok(ReadOutcome::Removed { key }),
            LookupResult::TransportError(err) => Err(err),
        }
    }

    async fn update(
        &self,
        _ctx: &OperationContext,
        _plan: &ResourceState,
        prior: &ResourceState,
    ) -> Result<ResourceState, ProviderError> {
        // Every attribute forces replacement.
        Ok(prior.clone())
    }

    #[instrument(skip_all, fields(resource = DOMAIN_TYPE_NAME))]
    async fn delete(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<(), ProviderError> {
        let key = self.key(state)?;
        let name = key.to_string();

        debug!(name = %name, "deleting SimpleDB domain");
        match ctx.run("DeleteDomain", self.client.delete_domain(&name)).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(name = %name, "SimpleDB domain already gone");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        let key = ResourceKey::single(ID_ATTRIBUTE, id)?;
        let data = DomainData {
            id: Some(key.to_string()),
            name: key.to_string(),
        };
        Ok(ResourceState::from_data(DOMAIN_TYPE_NAME, &data)?)
    }
}

#[cfg(test)]
mod tests {
    use drift_provider::ProviderError;
    use serde_json::json;

    use super::*;
    use crate::memory::MemorySimpleDb;

    fn adapter() -> DomainResource<MemorySimpleDb> {
        DomainResource::with_client(MemorySimpleDb::new())
    }

    fn plan(name: &str) -> ResourceState {
        ResourceState::new(DOMAIN_TYPE_NAME).with_attribute("name", json!(name))
    }

    #[tokio::test]
    async fn create_sets_id_to_name_without_reading() {
        let domains = adapter();
        let ctx = OperationContext::new();
        let mut state = ResourceState::new(DOMAIN_TYPE_NAME);

        domains.create(&ctx, &plan("alpha"), &mut state).await.unwrap();

        assert_eq!(state.id(), Some("alpha"));
        assert_eq!(state.string("name"), Some("alpha"));
        assert_eq!(domains.client().calls(), vec!["CreateDomain"]);
    }

    #[tokio::test]
    async fn failed_create_writes_nothing() {
        let domains = adapter();
        domains.client().fail_next(
            "CreateDomain",
            ProviderError::ExecutionFailed("NumberDomainsExceeded".into()),
        );
        let mut state = ResourceState::new(DOMAIN_TYPE_NAME);

        let err = domains
            .create(&OperationContext::new(), &plan("alpha"), &mut state)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("NumberDomainsExceeded"));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn locate_classifies_outcomes() {
        let domains = DomainResource::with_client(MemorySimpleDb::new().with_domain("alpha"));
        let ctx = OperationContext::new();

        assert!(domains.find_domain_by_name(&ctx, "alpha").await.is_found());
        assert!(domains.find_domain_by_name(&ctx, "beta").await.is_absent());

        domains.client().return_empty_metadata(true);
        match domains.find_domain_by_name(&ctx, "alpha").await {
            LookupResult::TransportError(ProviderError::EmptyResult(msg)) => {
                assert!(msg.contains("alpha"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn locate_rejects_empty_name() {
        let domains = adapter();
        let result = domains.find_domain_by_name(&OperationContext::new(), "").await;
        assert!(matches!(result, LookupResult::TransportError(ProviderError::Validation(_))));
        assert!(domains.client().calls().is_empty());
    }

    #[tokio::test]
    async fn read_of_missing_domain_is_removed() {
        let domains = adapter();
        let state = domains.import_state("ghost").unwrap();

        let outcome = domains.read(&OperationContext::new(), &state).await.unwrap();
        match outcome {
            ReadOutcome::Removed { key } => assert_eq!(key.to_string(), "ghost"),
            ReadOutcome::Refreshed(_) => panic!("expected removal"),
        }
    }

    #[tokio::test]
    async fn read_surfaces_transport_errors() {
        let domains = DomainResource::with_client(MemorySimpleDb::new().with_domain("alpha"));
        domains.client().fail_next("DomainMetadata", ProviderError::RateLimited);
        let state = domains.import_state("alpha").unwrap();

        let err = domains.read(&OperationContext::new(), &state).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn delete_of_missing_domain_succeeds() {
        let domains = adapter();
        let state = domains.import_state("ghost").unwrap();

        domains.delete(&OperationContext::new(), &state).await.unwrap();
        assert_eq!(domains.client().calls(), vec!["DeleteDomain"]);
    }

    #[tokio::test]
    async fn delete_surfaces_other_errors() {
        let domains = DomainResource::with_client(MemorySimpleDb::new().with_domain("alpha"));
        domains
            .client()
            .fail_next("DeleteDomain", ProviderError::Configuration("AccessDenied".into()));
        let state = domains.import_state("alpha").unwrap();

        assert!(domains.delete(&OperationContext::new(), &state).await.is_err());
        assert!(domains.client().has_domain("alpha"));
    }

    #[tokio::test]
    async fn update_returns_prior() {
        let domains = adapter();
        let prior = domains.import_state("alpha").unwrap();
        let updated = domains
            .update(&OperationContext::new(), &plan("beta"), &prior)
            .await
            .unwrap();
        assert_eq!(updated, prior);
        assert!(domains.client().calls().is_empty());
    }

    #[test]
    fn import_builds_minimal_record() {
        let state = adapter().import_state("alpha").unwrap();
        assert_eq!(state.id(), Some("alpha"));
        assert_eq!(state.string("name"), Some("alpha"));
        assert!(adapter().import_state("").is_err());
    }

    #[test]
    fn schema_forces_replacement_on_name() {
        let schema = adapter().schema();
        let prior = plan("alpha");
        assert_eq!(schema.requires_replace(&prior, &plan("beta")), vec!["name"]);
        assert!(schema.validate(&plan("alpha")).is_empty());
        assert!(!schema.validate(&ResourceState::new(DOMAIN_TYPE_NAME)).is_empty());
    }

    #[test]
    fn key_requires_id() {
        let domains = adapter();
        assert!(domains.key(&plan("alpha")).is_err());
        let key = domains.key(&domains.import_state("alpha").unwrap()).unwrap();
        assert_eq!(key.get(ID_ATTRIBUTE), Some("alpha"));
    }
}
