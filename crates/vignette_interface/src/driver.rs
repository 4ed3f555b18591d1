//! Generation capability traits.

use async_trait::async_trait;
use vignette_error::VignetteResult;

/// Where a reference image's bytes come from.
///
/// # Examples
///
/// ```
/// use vignette_interface::ImageSource;
///
/// let from_disk = ImageSource::Path("/tmp/page-1.png".into());
/// let inline = ImageSource::Bytes(vec![0x89, 0x50, 0x4E, 0x47]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file path
    Path(std::path::PathBuf),
    /// Raw bytes
    Bytes(Vec<u8>),
}

/// Model and output-size hints forwarded with every generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    /// Provider model identifier
    pub model: String,
    /// Output size hint, e.g. `1024x1536`
    pub size: String,
}

impl ImageParams {
    /// Params from a model identifier and a size hint.
    pub fn new(model: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            size: size.into(),
        }
    }
}

/// Image generation capability.
///
/// Implementations must support zero reference images (pure synthesis) as
/// well as one-or-many (edit/compose-with-references). Reference order is
/// meaningful: prompts bind entities to reference indices.
#[async_trait]
pub trait ImageDriver: Send + Sync {
    /// Generate one image from a prompt, an ordered reference set, and the
    /// caller's model/size hints.
    async fn generate_image(
        &self,
        prompt: &str,
        references: &[ImageSource],
        params: &ImageParams,
    ) -> VignetteResult<Vec<u8>>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Structured-text generation capability.
#[async_trait]
pub trait ScriptDriver: Send + Sync {
    /// Generate JSON conforming to `schema` from a text prompt.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> VignetteResult<serde_json::Value>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}
