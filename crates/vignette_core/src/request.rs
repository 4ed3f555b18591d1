//! The public comic request: script, style, and delivery options.

use crate::{EntityKind, Page};
use serde::{Deserialize, Serialize};
use vignette_error::{RequestError, RequestErrorKind, VignetteResult};

/// How the caller wants page artifacts returned.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnMode {
    /// Inline bytes in the response
    #[default]
    Inline,
    /// Base64-encoded bytes
    Base64,
    /// Time-limited retrieval URL
    SignedUrl,
}

/// A request to render a full comic job. Persisted verbatim as
/// `request.json` so deliveries can replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicRequest {
    /// Title used in page prompts
    pub comic_title: String,
    /// Global art style string
    pub style: String,
    /// Script pages in render order
    pub pages: Vec<Page>,
    /// Package the final artifact as a PDF instead of a ZIP
    #[serde(default)]
    pub return_pdf: bool,
    /// Root reference image for page 1 (locator, URL, or base64 data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Artifact delivery mode
    #[serde(default)]
    pub return_mode: ReturnMode,
}

impl ComicRequest {
    /// Validate the request shape. Validation errors surface immediately and
    /// are never retried or partially applied.
    pub fn validate(&self) -> VignetteResult<()> {
        if self.comic_title.trim().is_empty() {
            return Err(RequestError::new(RequestErrorKind::EmptyField("comic_title".into())).into());
        }
        if self.pages.is_empty() {
            return Err(RequestError::new(RequestErrorKind::EmptyPages).into());
        }
        for (i, page) in self.pages.iter().enumerate() {
            let expected = (i + 1) as u32;
            if page.page_number != expected {
                return Err(
                    RequestError::new(RequestErrorKind::PageNumbering(page.page_number)).into(),
                );
            }
            if page.panels.is_empty() {
                return Err(
                    RequestError::new(RequestErrorKind::EmptyPanels(page.page_number)).into(),
                );
            }
            for id in page.referenced_ids() {
                if EntityKind::from_id(&id).is_err() {
                    return Err(RequestError::new(RequestErrorKind::InvalidEntityId {
                        id,
                        message: "unrecognized kind prefix (char_/loc_/prop_)".to_string(),
                    })
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Total number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}
