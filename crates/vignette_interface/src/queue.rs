//! Task queue capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vignette_error::VignetteResult;

/// Opaque handle to a queued delivery, usable for best-effort cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{}", _0)]
pub struct TaskHandle(pub String);

/// At-least-once task delivery capability.
///
/// Correctness of the pipeline never depends on at-most-once delivery; the
/// manifest's idempotent transitions bound the damage of redelivery.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Deliver `payload` to `target`, optionally after a delay.
    async fn enqueue(
        &self,
        target: &str,
        payload: &serde_json::Value,
        delay: Option<Duration>,
    ) -> VignetteResult<TaskHandle>;

    /// Best-effort removal of a not-yet-delivered task. Returns `false` when
    /// the task no longer exists; the cooperative cancellation flag remains
    /// authoritative either way.
    async fn cancel(&self, handle: &TaskHandle) -> VignetteResult<bool>;
}
