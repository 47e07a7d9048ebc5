//! Data model shared by drift resource adapters.
//!
//! - [`ResourceKey`]: identity of a remote object (single or compound).
//! - [`ResourceState`]: the flat attribute record persisted by the host engine.
//! - [`Schema`]: attribute definitions, validation and replacement rules.
//! - [`Diagnostics`]: user-visible warnings and errors for one operation.
//! - [`Lifecycle`]: per-instance lifecycle state machine.

pub mod diagnostic;
pub mod key;
pub mod lifecycle;
pub mod schema;
pub mod state;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use key::{KEY_SEPARATOR, KeyError, ResourceKey};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleEvent};
pub use schema::{Attribute, AttributeType, Block, Schema, SchemaError};
pub use state::{ID_ATTRIBUTE, ResourceState};
