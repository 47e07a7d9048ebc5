pub mod context;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod managed;
pub mod registry;
pub mod resource;

pub use context::OperationContext;
pub use error::ProviderError;
pub use lookup::{Locator, LookupResult};
pub use managed::ManagedResource;
pub use registry::{OperationResponse, ResourceRegistry};
pub use resource::{DynResource, ReadOutcome, Resource};
