//! Final-artifact packaging capability.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use vignette_error::VignetteResult;

/// Packaging format for the final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// One PDF with a page per image
    Pdf,
    /// A ZIP of the page images
    Zip,
}

impl ArtifactFormat {
    /// Mime type recorded in the manifest's final-artifact entry.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }

    /// Conventional file name for the artifact inside a job directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Pdf => "comic.pdf",
            Self::Zip => "pages.zip",
        }
    }
}

/// Assembles ordered page images into a single deliverable file.
///
/// PDF/ZIP byte layout is a collaborator concern; only the contract lives in
/// this workspace.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Package `page_files` (in page order) into `out_path`.
    async fn package(
        &self,
        page_files: &[PathBuf],
        format: ArtifactFormat,
        out_path: &Path,
    ) -> VignetteResult<()>;
}
