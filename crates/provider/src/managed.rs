use drift_core::{Diagnostics, Lifecycle, LifecycleError, LifecycleEvent, ResourceState};
use tracing::debug;

use crate::context::OperationContext;
use crate::registry::ResourceRegistry;

/// One resource instance as tracked by a host engine.
///
/// Couples the stored record with its [`Lifecycle`] phase and drives the
/// registry operations in order. Failed operations leave both the record and
/// the phase untouched, except for a partially successful create which keeps
/// the recorded key.
#[derive(Debug, Clone)]
pub struct ManagedResource {
    type_name: String,
    lifecycle: Lifecycle,
    state: Option<ResourceState>,
    plan: Option<ResourceState>,
}

impl ManagedResource {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            lifecycle: Lifecycle::Unmanaged,
            state: None,
            plan: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn state(&self) -> Option<&ResourceState> {
        self.state.as_ref()
    }

    fn advance(&mut self, event: LifecycleEvent) -> Result<(), LifecycleError> {
        let next = self.lifecycle.transition(event)?;
        debug!(
            type_name = %self.type_name,
            from = %self.lifecycle,
            to = %next,
            "lifecycle transition"
        );
        self.lifecycle = next;
        Ok(())
    }

    /// Record the desired configuration for the next create.
    pub fn plan(&mut self, plan: ResourceState) -> Result<(), LifecycleError> {
        self.advance(LifecycleEvent::Plan)?;
        self.plan = Some(plan);
        Ok(())
    }

    /// Create the planned resource.
    pub async fn create(
        &mut self,
        registry: &ResourceRegistry,
        ctx: &OperationContext,
    ) -> Result<Diagnostics, LifecycleError> {
        self.lifecycle.transition(LifecycleEvent::Create)?;
        let plan = self
            .plan
            .clone()
            .unwrap_or_else(|| ResourceState::new(self.type_name.clone()));

        let resp = registry.create(ctx, plan).await;
        if let Some(state) = resp.state {
            // Partial success still tracks the created object.
            self.state = Some(state);
            self.plan = None;
            self.advance(LifecycleEvent::Create)?;
        }
        Ok(resp.diagnostics)
    }

    /// Refresh from the remote service.
    pub async fn refresh(
        &mut self,
        registry: &ResourceRegistry,
        ctx: &OperationContext,
    ) -> Result<Diagnostics, LifecycleError> {
        self.lifecycle.transition(LifecycleEvent::Refresh)?;
        let Some(state) = self.state.clone() else {
            return Ok(Diagnostics::new());
        };

        let resp = registry.read(ctx, state).await;
        if resp.has_error() {
            return Ok(resp.diagnostics);
        }
        match resp.state {
            Some(refreshed) => {
                self.state = Some(refreshed);
                self.advance(LifecycleEvent::Refresh)?;
            }
            None => self.advance(LifecycleEvent::Vanish)?,
        }
        Ok(resp.diagnostics)
    }

    /// Apply an in-place update.
    pub async fn update(
        &mut self,
        registry: &ResourceRegistry,
        ctx: &OperationContext,
        plan: ResourceState,
    ) -> Result<Diagnostics, LifecycleError> {
        self.lifecycle.transition(LifecycleEvent::Refresh)?;
        let Some(prior) = self.state.clone() else {
            return Ok(Diagnostics::new());
        };

        let resp = registry.update(ctx, plan, prior).await;
        if let Some(state) = resp.state {
            self.state = Some(state);
        }
        Ok(resp.diagnostics)
    }

    /// Delete the remote object. Allowed for created and stale records.
    pub async fn destroy(
        &mut self,
        registry: &ResourceRegistry,
        ctx: &OperationContext,
    ) -> Result<Diagnostics, LifecycleError> {
        self.lifecycle.transition(LifecycleEvent::Delete)?;
        let Some(state) = self.state.clone() else {
            return Ok(Diagnostics::new());
        };

        let resp = registry.delete(ctx, state).await;
        if !resp.has_error() {
            self.state = None;
            self.advance(LifecycleEvent::Delete)?;
        }
        Ok(resp.diagnostics)
    }

    /// Adopt an existing object by identifier. No remote call is made.
    pub fn import(
        &mut self,
        registry: &ResourceRegistry,
        id: &str,
    ) -> Result<Diagnostics, LifecycleError> {
        self.lifecycle.transition(LifecycleEvent::Import)?;
        let resp = registry.import_state(&self.type_name, id);
        if let Some(state) = resp.state {
            self.state = Some(state);
            self.advance(LifecycleEvent::Import)?;
        }
        Ok(resp.diagnostics)
    }

    /// Drop a stale record from state.
    pub fn forget(&mut self) -> Result<(), LifecycleError> {
        self.advance(LifecycleEvent::Forget)?;
        self.state = None;
        Ok(())
    }
}
