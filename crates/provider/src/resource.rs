use async_trait::async_trait;
use drift_core::{ResourceKey, ResourceState, Schema};

use crate::context::OperationContext;
use crate::error::ProviderError;

/// Result of refreshing a resource from the remote service.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The object exists; this is its full current state.
    Refreshed(ResourceState),
    /// The service confirmed the object is gone. The host should drop the
    /// record from state.
    Removed { key: ResourceKey },
}

/// Strongly-typed resource adapter trait with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn` methods
/// (which desugar to opaque `impl Future` return types). If you need dynamic
/// dispatch, use [`DynResource`] instead -- every `Resource` automatically
/// implements `DynResource` via a blanket implementation.
pub trait Resource: Send + Sync {
    /// Full resource type name (e.g. `aws_simpledb_domain`).
    fn type_name(&self) -> &str;

    /// Human-readable name used in diagnostics (e.g. `SimpleDB Domain`).
    fn display_name(&self) -> &str;

    /// Attribute schema for this resource type.
    fn schema(&self) -> Schema;

    /// Extract the key of a stored record.
    fn key(&self, state: &ResourceState) -> Result<ResourceKey, ProviderError>;

    /// Label for diagnostics: the key when one is available, otherwise
    /// whatever names the planned object.
    fn label(&self, state: &ResourceState) -> String {
        self.key(state).map_or_else(
            |_| state.string("name").unwrap_or("<unknown>").to_owned(),
            |key| key.to_string(),
        )
    }

    /// Create the remote object described by `plan`.
    ///
    /// The key is written into `state` as soon as the create call succeeds,
    /// so a failure in any later step still leaves the created object
    /// tracked. When the create call itself fails `state` is left untouched.
    fn create(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        state: &mut ResourceState,
    ) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;

    /// Refresh a stored record from the remote service.
    fn read(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> impl std::future::Future<Output = Result<ReadOutcome, ProviderError>> + Send;

    /// Apply in-place changes from `plan` to the object described by `prior`.
    fn update(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        prior: &ResourceState,
    ) -> impl std::future::Future<Output = Result<ResourceState, ProviderError>> + Send;

    /// Delete the remote object. Deleting an object that is already gone
    /// succeeds.
    fn delete(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;

    /// Build the minimal record for an externally supplied identifier.
    ///
    /// Only the identifier's format is checked; the following read validates
    /// that the object exists.
    fn import_state(&self, id: &str) -> Result<ResourceState, ProviderError>;
}

/// Object-safe resource trait for use behind `Arc<dyn DynResource>`.
///
/// Uses [`macro@async_trait`] to enable dynamic dispatch of async methods.
/// You generally should not implement this trait directly -- instead implement
/// [`Resource`] and rely on the blanket implementation.
#[async_trait]
pub trait DynResource: Send + Sync {
    fn type_name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn schema(&self) -> Schema;

    fn key(&self, state: &ResourceState) -> Result<ResourceKey, ProviderError>;

    fn label(&self, state: &ResourceState) -> String;

    async fn create(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        state: &mut ResourceState,
    ) -> Result<(), ProviderError>;

    async fn read(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<ReadOutcome, ProviderError>;

    async fn update(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        prior: &ResourceState,
    ) -> Result<ResourceState, ProviderError>;

    async fn delete(&self, ctx: &OperationContext, state: &ResourceState)
    -> Result<(), ProviderError>;

    fn import_state(&self, id: &str) -> Result<ResourceState, ProviderError>;
}

/// Blanket implementation: any type that implements [`Resource`] also
/// implements [`DynResource`], bridging the static and dynamic dispatch worlds.
#[async_trait]
impl<T: Resource + Sync> DynResource for T {
    fn type_name(&self) -> &str {
        Resource::type_name(self)
    }

    fn display_name(&self) -> &str {
        Resource::display_name(self)
    }

    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn key(&self, state: &ResourceState) -> Result<ResourceKey, ProviderError> {
        Resource::key(self, state)
    }

    fn label(&self, state: &ResourceState) -> String {
        Resource::label(self, state)
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        state: &mut ResourceState,
    ) -> Result<(), ProviderError> {
        Resource::create(self, ctx, plan, state).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<ReadOutcome, ProviderError> {
        Resource::read(self, ctx, state).await
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        plan: &ResourceState,
        prior: &ResourceState,
    ) -> Result<ResourceState, ProviderError> {
        Resource::update(self, ctx, plan, prior).await
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        state: &ResourceState,
    ) -> Result<(), ProviderError> {
        Resource::delete(self, ctx, state).await
    }

    fn import_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        Resource::import_state(self, id)
    }
}
