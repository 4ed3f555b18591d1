//! Input validation error types.

/// Kinds of request validation failures.
///
/// These surface immediately to the caller and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RequestErrorKind {
    /// Request contained no pages
    #[display("Request must contain at least one page")]
    EmptyPages,
    /// A page contained no panels
    #[display("Page {} must contain at least one panel", _0)]
    EmptyPanels(u32),
    /// Page numbers are not a contiguous 1-based sequence
    #[display("Page numbers must run 1..N without gaps; found {}", _0)]
    PageNumbering(u32),
    /// A required field was empty
    #[display("Field '{}' must not be empty", _0)]
    EmptyField(String),
    /// An id list contained a malformed entry
    #[display("Invalid entity id '{}': {}", id, message)]
    InvalidEntityId {
        /// The offending id
        id: String,
        /// Why it was rejected
        message: String,
    },
}

/// Error type for request validation.
///
/// # Examples
///
/// ```
/// use vignette_error::{RequestError, RequestErrorKind};
///
/// let err = RequestError::new(RequestErrorKind::EmptyPages);
/// assert!(format!("{}", err).contains("at least one page"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Request Error: {} at line {} in {}", kind, line, file)]
pub struct RequestError {
    /// The specific error condition
    pub kind: RequestErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl RequestError {
    /// Create a new RequestError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RequestErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
