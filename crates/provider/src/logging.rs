//! Tracing subscriber setup for processes embedding the adapters.
//!
//! Filtering follows `RUST_LOG`; when it is unset or invalid the given
//! default directive (normally `info`) applies.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Default filter directive when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info";

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a global `fmt` subscriber with an env filter.
///
/// Fails if a global subscriber is already installed.
pub fn try_init(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

/// Install the global subscriber, ignoring an already-installed one.
pub fn init() {
    if try_init(DEFAULT_DIRECTIVE).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init();
        init();
        assert!(try_init(DEFAULT_DIRECTIVE).is_err());
    }

    #[test]
    fn invalid_directive_falls_back() {
        let filter = env_filter("info");
        assert!(!filter.to_string().is_empty());
    }
}
