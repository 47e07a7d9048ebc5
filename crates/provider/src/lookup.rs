use std::future::Future;

use drift_core::ResourceKey;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::ProviderError;

/// Outcome of looking up one remote object by key.
///
/// `Absent` means the service confirmed the object does not exist.
/// `TransportError` means the lookup could not determine either way (auth,
/// throttling, network, an unrecognised service error, or a successful call
/// that came back with nothing in it). Callers must never treat the latter as
/// the former.
#[derive(Debug)]
pub enum LookupResult<T> {
    Found(T),
    Absent,
    TransportError(ProviderError),
}

impl<T> LookupResult<T> {
    /// Classify the raw result of a single lookup call.
    ///
    /// - `Err(NotFound)` becomes [`Absent`](Self::Absent).
    /// - `Ok(None)` becomes a [`TransportError`](Self::TransportError) with an
    ///   [`EmptyResult`](ProviderError::EmptyResult) naming `key`.
    /// - Any other error is kept verbatim.
    pub fn classify(result: Result<Option<T>, ProviderError>, key: &ResourceKey) -> Self {
        match result {
            Ok(Some(found)) => Self::Found(found),
            Ok(None) => Self::TransportError(ProviderError::EmptyResult(format!(
                "lookup for ({key}) returned no object"
            ))),
            Err(ProviderError::NotFound(reason)) => {
                debug!(key = %key, reason = %reason, "remote object absent");
                Self::Absent
            }
            Err(err) => Self::TransportError(err),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The found object, discarding the other outcomes.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(found) => Some(found),
            Self::Absent | Self::TransportError(_) => None,
        }
    }

    /// Collapse into a `Result`, with absence as `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ProviderError> {
        match self {
            Self::Found(found) => Ok(Some(found)),
            Self::Absent => Ok(None),
            Self::TransportError(err) => Err(err),
        }
    }

    /// Collapse into a `Result` where absence is a
    /// [`NotFound`](ProviderError::NotFound) error.
    pub fn require(self, what: impl std::fmt::Display) -> Result<T, ProviderError> {
        match self {
            Self::Found(found) => Ok(found),
            Self::Absent => Err(ProviderError::NotFound(what.to_string())),
            Self::TransportError(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LookupResult<U> {
        match self {
            Self::Found(found) => LookupResult::Found(f(found)),
            Self::Absent => LookupResult::Absent,
            Self::TransportError(err) => LookupResult::TransportError(err),
        }
    }
}

/// Finds one remote object by its key.
///
/// Implementations issue exactly one remote call per [`locate`](Self::locate),
/// perform no retries and have no side effects.
pub trait Locator: Send + Sync {
    /// Descriptor of the remote object.
    type Object: Send;

    /// Look up the object identified by `key`.
    fn locate(
        &self,
        ctx: &OperationContext,
        key: &ResourceKey,
    ) -> impl Future<Output = LookupResult<Self::Object>> + Send;
}
