//! Top-level error wrapper types.

use crate::{
    ConfigError, GenerationError, LookbookError, QueueError, RenderError, RequestError,
    StorageError,
};

/// The foundation error enum for the Vignette workspace.
///
/// # Examples
///
/// ```
/// use vignette_error::{VignetteError, ConfigError};
///
/// let err: VignetteError = ConfigError::new("missing field").into();
/// assert!(format!("{}", err).contains("Config Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum VignetteErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Input validation error
    #[from(RequestError)]
    Request(RequestError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Lookbook / entity registry error
    #[from(LookbookError)]
    Lookbook(LookbookError),
    /// Generation capability error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Render pipeline error
    #[from(RenderError)]
    Render(RenderError),
    /// Task queue error
    #[from(QueueError)]
    Queue(QueueError),
}

/// Vignette error with kind discrimination.
///
/// # Examples
///
/// ```
/// use vignette_error::{VignetteResult, RequestError, RequestErrorKind};
///
/// fn validate() -> VignetteResult<()> {
///     Err(RequestError::new(RequestErrorKind::EmptyPages))?
/// }
///
/// assert!(validate().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Vignette Error: {}", _0)]
pub struct VignetteError(Box<VignetteErrorKind>);

impl VignetteError {
    /// Create a new error from a kind.
    pub fn new(kind: VignetteErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VignetteErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to VignetteErrorKind
impl<T> From<T> for VignetteError
where
    T: Into<VignetteErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Vignette operations.
pub type VignetteResult<T> = std::result::Result<T, VignetteError>;
