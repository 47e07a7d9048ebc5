//! Host-facing entry point.
//!
//! The [`ResourceRegistry`] owns one adapter per resource type and turns the
//! adapters' typed results into what a host engine consumes: an optional new
//! state record plus [`Diagnostics`]. This is where absence becomes a
//! "remove from state" signal and every other failure becomes an error
//! diagnostic naming the operation and the resource.

use std::collections::HashMap;
use std::sync::Arc;

use drift_core::{Diagnostic, Diagnostics, ResourceState, Schema};
use tracing::{debug, error, info, instrument, warn};

use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::resource::{DynResource, ReadOutcome};

/// New state (if any) and diagnostics returned for one operation.
///
/// For reads, `state == None` instructs the host to drop the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResponse {
    pub state: Option<ResourceState>,
    pub diagnostics: Diagnostics,
}

impl OperationResponse {
    fn with_state(state: ResourceState) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    fn failed(state: Option<ResourceState>, diagnostic: Diagnostic) -> Self {
        Self {
            state,
            diagnostics: diagnostic.into(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// Registry of resource adapters keyed by type name.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<dyn DynResource>>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.metadata())
            .finish()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. Type names must be unique.
    pub fn register(&mut self, resource: Arc<dyn DynResource>) -> Result<(), ProviderError> {
        let type_name = resource.type_name().to_owned();
        if self.resources.contains_key(&type_name) {
            return Err(ProviderError::Configuration(format!(
                "resource type '{type_name}' is already registered"
            )));
        }
        debug!(type_name = %type_name, "registered resource type");
        self.resources.insert(type_name, resource);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn DynResource>> {
        self.resources.get(type_name).cloned()
    }

    /// Registered type names, sorted.
    pub fn metadata(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn schema(&self, type_name: &str) -> Option<Schema> {
        self.resources.get(type_name).map(|r| r.schema())
    }

    fn resolve(&self, type_name: &str) -> Result<&Arc<dyn DynResource>, Diagnostic> {
        self.resources.get(type_name).ok_or_else(|| {
            Diagnostic::error(
                "Unsupported resource type",
                format!("resource type '{type_name}' is not registered"),
            )
        })
    }

    /// Validate `plan` and create the remote object.
    ///
    /// If the adapter recorded a key before failing, that partial state is
    /// returned next to the error so the object stays tracked.
    #[instrument(skip(self, ctx, plan), fields(type_name = %plan.type_name))]
    pub async fn create(
        &self,
        ctx: &OperationContext,
        mut plan: ResourceState,
    ) -> OperationResponse {
        let resource = match self.resolve(&plan.type_name) {
            Ok(resource) => resource,
            Err(diag) => return OperationResponse::failed(None, diag),
        };

        let schema = resource.schema();
        if let Err(diagnostics) = prepare_plan(&schema, &mut plan) {
            return OperationResponse {
                state: None,
                diagnostics,
            };
        }

        let label = resource.label(&plan);
        let mut state = ResourceState::new(plan.type_name.clone());
        match resource.create(ctx, &plan, &mut state).await {
            Ok(()) => {
                info!(resource = %label, "created {}", resource.display_name());
                OperationResponse::with_state(state)
            }
            Err(err) => {
                error!(resource = %label, error = %err, "create failed");
                let partial = (!state.is_empty()).then_some(state);
                OperationResponse::failed(
                    partial,
                    Diagnostic::error(
                        format!("creating {} ({label})", resource.display_name()),
                        err.to_string(),
                    ),
                )
            }
        }
    }

    /// Refresh a stored record.
    ///
    /// Confirmed absence drops the record with a warning. Any other failure
    /// keeps the stored record unchanged.
    #[instrument(skip(self, ctx, state), fields(type_name = %state.type_name))]
    pub async fn read(&self, ctx: &OperationContext, state: ResourceState) -> OperationResponse {
        let resource = match self.resolve(&state.type_name) {
            Ok(resource) => resource,
            Err(diag) => return OperationResponse::failed(Some(state), diag),
        };

        let label = resource.label(&state);
        match resource.read(ctx, &state).await {
            Ok(ReadOutcome::Refreshed(refreshed)) => OperationResponse::with_state(refreshed),
            Ok(ReadOutcome::Removed { key }) => {
                warn!(
                    resource = %key,
                    "{} not found, removing from state",
                    resource.display_name()
                );
                OperationResponse::failed(
                    None,
                    Diagnostic::warning(
                        "Resource not found",
                        format!(
                            "{} ({key}) was not found, removing from state",
                            resource.display_name()
                        ),
                    ),
                )
            }
            Err(err) => {
                error!(resource = %label, error = %err, "read failed");
                OperationResponse::failed(
                    Some(state),
                    Diagnostic::error(
                        format!("reading {} ({label})", resource.display_name()),
                        err.to_string(),
                    ),
                )
            }
        }
    }

    /// Apply in-place changes.
    ///
    /// The plan gets the same defaults and validation as on create. Changes to
    /// replace-forcing attributes are reported as warnings; the host is
    /// expected to destroy and recreate instead of calling update.
    #[instrument(skip(self, ctx, plan, prior), fields(type_name = %prior.type_name))]
    pub async fn update(
        &self,
        ctx: &OperationContext,
        mut plan: ResourceState,
        prior: ResourceState,
    ) -> OperationResponse {
        let resource = match self.resolve(&prior.type_name) {
            Ok(resource) => resource,
            Err(diag) => return OperationResponse::failed(Some(prior), diag),
        };

        let schema = resource.schema();
        if let Err(diagnostics) = prepare_plan(&schema, &mut plan) {
            return OperationResponse {
                state: Some(prior),
                diagnostics,
            };
        }

        let label = resource.label(&prior);
        let mut diagnostics = Diagnostics::new();
        let forced = schema.requires_replace(&prior, &plan);
        if !forced.is_empty() {
            warn!(
                resource = %label,
                attributes = ?forced,
                "update called for replace-only changes"
            );
            diagnostics.add_warning(
                format!("updating {} ({label})", resource.display_name()),
                format!(
                    "changes to {} require replacement and were not applied",
                    forced.join(", ")
                ),
            );
        }

        match resource.update(ctx, &plan, &prior).await {
            Ok(updated) => OperationResponse {
                state: Some(updated),
                diagnostics,
            },
            Err(err) => {
                error!(resource = %label, error = %err, "update failed");
                diagnostics.add_error(
                    format!("updating {} ({label})", resource.display_name()),
                    err.to_string(),
                );
                OperationResponse {
                    state: Some(prior),
                    diagnostics,
                }
            }
        }
    }

    /// Delete the remote object. On failure the record is returned so the
    /// resource stays managed and the delete can be retried.
    #[instrument(skip(self, ctx, state), fields(type_name = %state.type_name))]
    pub async fn delete(&self, ctx: &OperationContext, state: ResourceState) -> OperationResponse {
        let resource = match self.resolve(&state.type_name) {
            Ok(resource) => resource,
            Err(diag) => return OperationResponse::failed(Some(state), diag),
        };

        let label = resource.label(&state);
        match resource.delete(ctx, &state).await {
            Ok(()) => {
                info!(resource = %label, "deleted {}", resource.display_name());
                OperationResponse::default()
            }
            Err(err) => {
                error!(resource = %label, error = %err, "delete failed");
                OperationResponse::failed(
                    Some(state),
                    Diagnostic::error(
                        format!("deleting {} ({label})", resource.display_name()),
                        err.to_string(),
                    ),
                )
            }
        }
    }

    /// Build the minimal record for an imported identifier. No remote call.
    pub fn import_state(&self, type_name: &str, id: &str) -> OperationResponse {
        let resource = match self.resolve(type_name) {
            Ok(resource) => resource,
            Err(diag) => return OperationResponse::failed(None, diag),
        };

        match resource.import_state(id) {
            Ok(state) => OperationResponse::with_state(state),
            Err(err) => OperationResponse::failed(
                None,
                Diagnostic::error(
                    format!("importing {} ({id})", resource.display_name()),
                    err.to_string(),
                ),
            ),
        }
    }
}

/// Fill schema defaults into `plan` and validate it.
fn prepare_plan(schema: &Schema, plan: &mut ResourceState) -> Result<(), Diagnostics> {
    schema.apply_defaults(plan);
    let violations = schema.validate(plan);
    if violations.is_empty() {
        return Ok(());
    }

    let mut diagnostics = Diagnostics::new();
    for violation in violations {
        let attribute = violation.attribute().to_owned();
        diagnostics.push(
            Diagnostic::error("Invalid resource configuration", violation.to_string())
                .with_attribute(attribute),
        );
    }
    Err(diagnostics)
}
