//! Bounded retry with exponential backoff and jitter.
//!
//! One utility applied uniformly to generation and upload calls, instead of
//! per-call-site sleep loops.

use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::{Retry, RetryError};
use vignette_core::VignetteConfig;
use vignette_error::{VignetteError, VignetteResult};

/// Delays never grow past this, whatever the attempt count.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Retry policy derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    base_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy with an explicit attempt budget and base delay.
    pub fn new(attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }

    /// Policy from the process configuration.
    pub fn from_config(config: &VignetteConfig) -> Self {
        Self::new(*config.retry_attempts(), *config.retry_base_delay_ms())
    }

    /// Total attempts this policy allows.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Run `op` until it succeeds or the attempt budget is spent. Every
    /// failure is treated as transient; the last error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> VignetteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VignetteResult<T>>,
    {
        if self.attempts == 1 {
            return op().await;
        }
        let strategy = ExponentialBackoff::from_millis(self.base_delay_ms)
            .factor(2)
            .max_delay(MAX_DELAY)
            .map(jitter)
            .take(self.attempts - 1);

        Retry::spawn(strategy, || {
            let fut = op();
            async move {
                fut.await.map_err(|e: VignetteError| {
                    tracing::warn!(error = %e, "Attempt failed, will retry");
                    RetryError::Transient {
                        err: e,
                        retry_after: None,
                    }
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vignette_error::{GenerationError, GenerationErrorKind};

    fn flaky_error() -> VignetteError {
        GenerationError::new(GenerationErrorKind::Provider("boom".into())).into()
    }

    #[tokio::test]
    async fn stops_at_the_attempt_budget() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, 1);
        let result: VignetteResult<()> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(flaky_error()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, 1);
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(flaky_error())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }
}
