use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one managed resource instance, as seen by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Not tracked in state.
    Unmanaged,
    /// Declared in configuration, not yet created.
    Planned,
    /// Created (or imported) and recorded in state.
    Created,
    /// Recorded in state but the remote object is gone.
    Stale,
    /// Remote delete succeeded.
    Deleted,
}

/// Something that happened to a resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Plan,
    Create,
    Import,
    /// A read found the remote object.
    Refresh,
    /// A read confirmed the remote object is absent.
    Vanish,
    Delete,
    /// The engine dropped the record from state.
    Forget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition: {event:?} from {from}")]
pub struct LifecycleError {
    pub from: Lifecycle,
    pub event: LifecycleEvent,
}

impl Lifecycle {
    /// Apply an event, returning the next state.
    ///
    /// Failed operations are not events: a transport error leaves the
    /// lifecycle where it was.
    pub fn transition(self, event: LifecycleEvent) -> Result<Lifecycle, LifecycleError> {
        use Lifecycle::{Created, Deleted, Planned, Stale, Unmanaged};
        use LifecycleEvent::{Create, Delete, Forget, Import, Plan, Refresh, Vanish};

        let next = match (self, event) {
            (Unmanaged | Deleted, Plan) => Planned,
            (Unmanaged, Import) | (Planned, Create) | (Created, Refresh) => Created,
            (Created, Vanish) => Stale,
            (Created | Stale, Delete) => Deleted,
            (Stale | Deleted, Forget) => Unmanaged,
            (from, event) => return Err(LifecycleError { from, event }),
        };
        Ok(next)
    }

    /// Whether the host engine holds a state record in this phase.
    pub fn in_state(self) -> bool {
        matches!(self, Lifecycle::Created | Lifecycle::Stale)
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Unmanaged => write!(f, "unmanaged"),
            Lifecycle::Planned => write!(f, "planned"),
            Lifecycle::Created => write!(f, "created"),
            Lifecycle::Stale => write!(f, "stale"),
            Lifecycle::Deleted => write!(f, "deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_path() {
        let s = Lifecycle::Unmanaged
            .transition(LifecycleEvent::Plan)
            .and_then(|s| s.transition(LifecycleEvent::Create))
            .and_then(|s| s.transition(LifecycleEvent::Refresh))
            .unwrap();
        assert_eq!(s, Lifecycle::Created);
        assert!(s.in_state());
    }

    #[test]
    fn out_of_band_delete_then_forget() {
        let s = Lifecycle::Created.transition(LifecycleEvent::Vanish).unwrap();
        assert_eq!(s, Lifecycle::Stale);
        assert_eq!(
            s.transition(LifecycleEvent::Forget).unwrap(),
            Lifecycle::Unmanaged
        );
    }

    #[test]
    fn stale_resources_can_still_be_deleted() {
        assert_eq!(
            Lifecycle::Stale.transition(LifecycleEvent::Delete).unwrap(),
            Lifecycle::Deleted
        );
    }

    #[test]
    fn import_skips_planning() {
        assert_eq!(
            Lifecycle::Unmanaged.transition(LifecycleEvent::Import).unwrap(),
            Lifecycle::Created
        );
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let err = Lifecycle::Planned
            .transition(LifecycleEvent::Delete)
            .unwrap_err();
        assert_eq!(err.from, Lifecycle::Planned);
        assert_eq!(err.to_string(), "invalid lifecycle transition: Delete from planned");
        assert!(Lifecycle::Deleted.transition(LifecycleEvent::Refresh).is_err());
    }
}
