use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ProviderError;

/// Ambient context for one resource operation.
///
/// Carries the host's cancellation signal and an optional deadline. Every
/// remote call an adapter makes goes through [`OperationContext::run`], so a
/// user interrupt or global timeout aborts the in-flight call instead of
/// blocking until the service answers.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl OperationContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    /// A child context: cancelled with this one, but cancellable on its own.
    ///
    /// The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first, in which case `fut` is dropped.
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if self.cancel.is_cancelled() {
            warn!(operation, "operation cancelled before start");
            return Err(ProviderError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = self.cancel.cancelled() => {
                warn!(operation, "operation cancelled");
                Err(ProviderError::Cancelled)
            }
            () = deadline => {
                let timeout = self.deadline.map(|(_, d)| d).unwrap_or_default();
                warn!(operation, ?timeout, "operation deadline exceeded");
                Err(ProviderError::Timeout(timeout))
            }
            result = fut => result,
        }
    }

    /// Sleep for `period`, waking early with an error on cancellation or
    /// deadline expiry.
    pub async fn sleep(&self, operation: &str, period: Duration) -> Result<(), ProviderError> {
        self.run(operation, async {
            tokio::time::sleep(period).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_not_cancelled() {
        let ctx = OperationContext::new();
        let value = ctx.run("op", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn propagates_inner_error() {
        let ctx = OperationContext::new();
        let err = ctx
            .run::<_, ()>("op", async { Err(ProviderError::RateLimited) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn pre_cancelled_context_never_polls() {
        let polled = std::sync::atomic::AtomicBool::new(false);
        let ctx = OperationContext::new();
        ctx.cancel();
        let err = ctx
            .run("op", async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call() {
        let ctx = OperationContext::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let err = ctx
            .run::<_, ()>("op", std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_timeout() {
        let ctx = OperationContext::new().with_timeout(Duration::from_secs(30));
        let err = ctx
            .run::<_, ()>("op", std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn child_is_cancelled_with_parent() {
        let parent = OperationContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());

        let other = OperationContext::new();
        let other_child = other.child();
        other_child.cancel();
        assert!(!other.is_cancelled());
    }
}
