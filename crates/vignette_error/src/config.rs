//! Configuration error type.

/// Error raised when configuration is missing or malformed.
///
/// # Examples
///
/// ```
/// use vignette_error::ConfigError;
///
/// let err = ConfigError::new("VIGNETTE_DATA_DIR is not a directory");
/// assert!(format!("{}", err).contains("not a directory"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Config Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// Human-readable error detail
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with automatic location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
