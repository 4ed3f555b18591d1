//! Lookbook (entity registry) error types.

/// Specific error conditions for lookbook operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum LookbookErrorKind {
    /// Registry document missing for a job that requires one
    #[display("Lookbook not seeded for job '{}'; seed it first", _0)]
    NotSeeded(String),
    /// Entity id uses an unrecognized kind prefix
    #[display("Entity id '{}' has no recognized kind prefix (char_/loc_/prop_)", _0)]
    UnknownIdPrefix(String),
    /// Entity id referenced but absent from the registry
    #[display("Entity '{}' not found in lookbook", _0)]
    EntityNotFound(String),
    /// Failed to persist the registry document
    #[display("Failed to save lookbook: {}", _0)]
    Save(String),
}

/// Error type for lookbook operations.
///
/// # Examples
///
/// ```
/// use vignette_error::{LookbookError, LookbookErrorKind};
///
/// let err = LookbookError::new(LookbookErrorKind::NotSeeded("job1".to_string()));
/// assert!(format!("{}", err).contains("seed it first"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Lookbook Error: {} at line {} in {}", kind, line, file)]
pub struct LookbookError {
    /// The specific error condition
    pub kind: LookbookErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl LookbookError {
    /// Create a new LookbookError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LookbookErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
