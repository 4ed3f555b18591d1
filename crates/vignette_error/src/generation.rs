//! Generation capability error types.

/// Kinds of generation failures reported by image/text drivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// The provider returned an error response
    #[display("Provider error: {}", _0)]
    Provider(String),
    /// The provider response lacked usable output
    #[display("Empty or malformed provider response: {}", _0)]
    EmptyResponse(String),
    /// A reference image could not be read or attached
    #[display("Reference image unusable: {}", _0)]
    BadReference(String),
    /// Structured output did not conform to the requested schema
    #[display("Schema violation: {}", _0)]
    SchemaViolation(String),
}

/// Error type for generation capability calls.
///
/// These are the transient, retryable failures of the pipeline; the retry
/// utility wraps them before they surface in the manifest.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The specific error condition
    pub kind: GenerationErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
