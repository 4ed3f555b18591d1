//! Task queue error types.

/// Kinds of task queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum QueueErrorKind {
    /// Failed to enqueue a delivery
    #[display("Failed to enqueue task: {}", _0)]
    Enqueue(String),
    /// Failed to cancel a queued delivery
    #[display("Failed to cancel task '{}': {}", handle, message)]
    Cancel {
        /// Opaque task handle
        handle: String,
        /// Error detail
        message: String,
    },
}

/// Error type for task queue operations.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Queue Error: {} at line {} in {}", kind, line, file)]
pub struct QueueError {
    /// The specific error condition
    pub kind: QueueErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl QueueError {
    /// Create a new QueueError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: QueueErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
