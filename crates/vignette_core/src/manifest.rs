//! The per-job manifest: page lifecycle states and the final-artifact record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vignette_error::{RenderError, RenderErrorKind, VignetteResult};

/// Lifecycle state of a single page within a job.
///
/// Within one job attempt a page only moves forward along
/// `pending -> running -> rendered -> done`; `blocked_missing_refs` and
/// `failed` are terminal for the attempt but resumable back into `running`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PageStatus {
    /// Not yet attempted
    Pending,
    /// Generation in progress
    Running,
    /// Rendered locally; durable upload not yet confirmed
    Rendered,
    /// Rendered and uploaded; stable terminal state
    Done,
    /// Required entity references could not be resolved
    BlockedMissingRefs,
    /// Generation exhausted its retry budget
    Failed,
}

impl PageStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// Same-status re-entry is allowed for diagnostic updates (`running`
    /// attempt counts, `rendered` upload retries). `done` never regresses.
    pub fn can_advance_to(&self, next: PageStatus) -> bool {
        use PageStatus::*;
        matches!(
            (self, next),
            (Pending, Pending | Running)
                | (Running, Running | Rendered | BlockedMissingRefs | Failed)
                | (Rendered, Rendered | Done)
                | (Done, Done)
                | (BlockedMissingRefs, BlockedMissingRefs | Running)
                | (Failed, Failed | Running)
        )
    }

    /// Whether this page needs no further work.
    pub fn is_done(&self) -> bool {
        matches!(self, PageStatus::Done)
    }
}

/// Per-page manifest entry: status plus diagnostic metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    /// Current lifecycle status
    pub status: Option<PageStatus>,
    /// Generation attempts made in the most recent run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Local output path once rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Durable storage locator once uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Whether durable upload succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
    /// Upload error text when upload failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
    /// Last generation error when the page failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Unresolvable entity ids with reasons, when blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<BTreeMap<String, String>>,
    /// Entity ids this page used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids_used: Vec<String>,
    /// The reference image the page chained from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_reference: Option<String>,
}

impl PageState {
    fn pending() -> Self {
        Self {
            status: Some(PageStatus::Pending),
            ..Self::default()
        }
    }

    /// Current status, defaulting to pending for sparse entries.
    pub fn status(&self) -> PageStatus {
        self.status.unwrap_or(PageStatus::Pending)
    }
}

/// The final packaged artifact's state. Populated exactly once, even when
/// packaging or upload fails — callers then retry retrieval, not generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifact {
    /// Artifact mime type ("application/pdf" or "application/zip")
    pub mime: String,
    /// Durable storage locator on upload success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    /// Local fallback path when upload failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Upload error text when upload failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
}

/// Persisted per-job record of every page's render/upload status.
///
/// The manifest is the only mutable state shared between concurrent task
/// deliveries for the same job; every mutation is a read-modify-write of the
/// persisted form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    /// Page number (1-based) to page state
    #[serde(default)]
    pub pages: BTreeMap<u32, PageState>,
    /// Final artifact record; `None` until all pages are done
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_artifact: Option<FinalArtifact>,
    /// One-way cancellation latch
    #[serde(default)]
    pub cancelled: bool,
    /// Opaque handle to the in-flight queue delivery, for cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
}

impl JobManifest {
    /// A fresh manifest with `total_pages` entries, all pending.
    pub fn seeded(total_pages: u32) -> Self {
        Self {
            pages: (1..=total_pages).map(|n| (n, PageState::pending())).collect(),
            ..Self::default()
        }
    }

    /// Status of a page, treating absent entries as pending.
    pub fn page_status(&self, page: u32) -> PageStatus {
        self.pages
            .get(&page)
            .map(PageState::status)
            .unwrap_or(PageStatus::Pending)
    }

    /// Page numbers that have reached `done`, in order.
    pub fn pages_done(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages
            .iter()
            .filter(|(_, s)| s.status().is_done())
            .map(|(n, _)| *n)
    }

    /// The first page that is not `done`, if any.
    pub fn first_unfinished(&self) -> Option<u32> {
        self.pages
            .iter()
            .find(|(_, s)| !s.status().is_done())
            .map(|(n, _)| *n)
    }

    /// Whether every page is `done`.
    pub fn all_done(&self) -> bool {
        !self.pages.is_empty() && self.pages.values().all(|s| s.status().is_done())
    }

    /// The highest page that is `done`, if any. Resume chains from this
    /// page's artifact.
    pub fn last_done(&self) -> Option<u32> {
        self.pages
            .iter()
            .rev()
            .find(|(_, s)| s.status().is_done())
            .map(|(n, _)| *n)
    }

    /// Advance a page's status, enforcing the state machine, and merge in the
    /// diagnostic fields of `meta` that are set.
    pub fn advance(&mut self, page: u32, status: PageStatus, meta: PageState) -> VignetteResult<()> {
        let entry = self.pages.entry(page).or_insert_with(PageState::pending);
        let current = entry.status();
        if !current.can_advance_to(status) {
            return Err(RenderError::new(RenderErrorKind::IllegalTransition {
                page,
                from: current.to_string(),
                to: status.to_string(),
            })
            .into());
        }
        entry.status = Some(status);
        if meta.attempts.is_some() {
            entry.attempts = meta.attempts;
        }
        if meta.local.is_some() {
            entry.local = meta.local;
        }
        if meta.remote.is_some() {
            entry.remote = meta.remote;
        }
        if meta.uploaded.is_some() {
            entry.uploaded = meta.uploaded;
        }
        if meta.upload_error.is_some() {
            entry.upload_error = meta.upload_error;
        }
        if meta.last_error.is_some() {
            entry.last_error = meta.last_error;
        }
        if meta.missing.is_some() {
            entry.missing = meta.missing;
        }
        if !meta.ids_used.is_empty() {
            entry.ids_used = meta.ids_used;
        }
        if meta.prev_reference.is_some() {
            entry.prev_reference = meta.prev_reference;
        }
        Ok(())
    }

    /// Set the cancellation latch. False-to-true only; cancelling twice is a
    /// no-op and un-cancelling is ignored.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}
