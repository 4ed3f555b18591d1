//! Render pipeline error types.

/// Specific error conditions for the chained page renderer and job driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RenderErrorKind {
    /// Job manifest is missing or unreadable; the job cannot resume
    #[display("Manifest unreadable for job '{}': {}", job_id, message)]
    ManifestCorrupt {
        /// Job identifier
        job_id: String,
        /// Parse or IO error detail
        message: String,
    },
    /// Job state (request document) could not be located locally or remotely
    #[display("Unknown job '{}'", _0)]
    UnknownJob(String),
    /// Root reference image missing or unreadable
    #[display("Invalid or missing root reference image: {}", _0)]
    MissingRootReference(String),
    /// Page generation exhausted its retry budget
    #[display("Page {} failed after {} attempts: {}", page, attempts, last_error)]
    PageExhausted {
        /// 1-based page number
        page: u32,
        /// Attempts made
        attempts: usize,
        /// Last error message
        last_error: String,
    },
    /// A manifest status transition that would move a page backwards
    #[display("Illegal status transition for page {}: {} -> {}", page, from, to)]
    IllegalTransition {
        /// 1-based page number
        page: u32,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
    /// Final artifact packaging failed
    #[display("Packaging failed: {}", _0)]
    Packaging(String),
}

/// Error type for render pipeline operations.
///
/// # Examples
///
/// ```
/// use vignette_error::{RenderError, RenderErrorKind};
///
/// let err = RenderError::new(RenderErrorKind::UnknownJob("nope".to_string()));
/// assert!(format!("{}", err).contains("Unknown job"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Render Error: {} at line {} in {}", kind, line, file)]
pub struct RenderError {
    /// The specific error condition
    pub kind: RenderErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl RenderError {
    /// Create a new RenderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RenderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
