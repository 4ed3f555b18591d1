//! Targeted deletion of reference assets.
//!
//! Cleanup removes assets from both the blob store and the registry so a
//! regeneration pass starts clean. The cover is user-supplied and survives a
//! wildcard unless explicitly included.

use crate::LookbookStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vignette_error::VignetteResult;

/// Every asset type the cleanup wildcard can expand to.
pub const ALL_ASSET_TYPES: &[&str] = &["portrait", "turnaround", "wide", "detail", "cover"];

/// A request to delete reference assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanRequest {
    /// Job whose assets to clean
    pub job_id: String,
    /// Asset types to remove per entity id; `"*"` expands to all types
    #[serde(default)]
    pub targets: BTreeMap<String, Vec<String>>,
    /// Also delete cover assets when a wildcard matches them
    #[serde(default)]
    pub include_cover: bool,
    /// Report what would be deleted without deleting anything
    #[serde(default)]
    pub dry_run: bool,
    /// Drop entities left with zero assets from the registry
    #[serde(default)]
    pub prune_empty: bool,
}

/// Per-entity cleanup report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Entity id
    pub id: String,
    /// Asset types removed (or that would be removed, in a dry run)
    pub removed: Vec<String>,
    /// Asset types requested but absent or protected
    pub skipped: Vec<String>,
    /// Diagnostic note, e.g. "not_found"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of one cleanup call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanOutcome {
    /// Per-entity reports in request order
    pub reports: Vec<CleanReport>,
    /// Entity ids pruned from the registry
    pub pruned: Vec<String>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl LookbookStore {
    /// Delete the requested reference assets and persist the updated
    /// registry. A dry run computes the same reports without touching
    /// storage or the document.
    ///
    /// # Errors
    ///
    /// Fails when the registry has not been seeded or the updated document
    /// cannot be persisted. Individual blob deletions are best-effort.
    #[tracing::instrument(skip(self, req), fields(job_id = %req.job_id, dry_run = req.dry_run))]
    pub async fn clean_assets(&self, req: &CleanRequest) -> VignetteResult<CleanOutcome> {
        let mut doc = self.load_required(&req.job_id).await?;
        let paths = self.paths(&req.job_id);
        let mut outcome = CleanOutcome {
            dry_run: req.dry_run,
            ..CleanOutcome::default()
        };

        for (id, requested) in &req.targets {
            let mut report = CleanReport {
                id: id.clone(),
                ..CleanReport::default()
            };
            let Some(entity) = doc.entity(id) else {
                report.note = Some("not_found".to_string());
                outcome.reports.push(report);
                continue;
            };

            let wildcard = requested.iter().any(|t| t == "*");
            let mut types: Vec<String> = if wildcard {
                ALL_ASSET_TYPES.iter().map(|t| t.to_string()).collect()
            } else {
                requested.clone()
            };
            types.dedup();

            for asset_type in types {
                if asset_type == "cover" && wildcard && !req.include_cover {
                    report.skipped.push(asset_type);
                    continue;
                }
                let Some(asset) = entity.asset(&asset_type) else {
                    report.skipped.push(asset_type);
                    continue;
                };
                if !req.dry_run {
                    // Covers carry caller-supplied locators outside the job's
                    // key scheme, so prefer the recorded locator.
                    let key = asset
                        .locator
                        .clone()
                        .unwrap_or_else(|| paths.asset_blob_key(id, &asset_type));
                    if let Err(e) = self.blobs().delete(&key).await {
                        tracing::warn!(id, asset_type, error = %e, "Blob delete failed");
                    }
                    let local = paths.asset_file(id, &asset_type);
                    if let Err(e) = tokio::fs::remove_file(&local).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::debug!(path = %local.display(), error = %e, "Local asset remove failed");
                        }
                    }
                }
                report.removed.push(asset_type);
            }
            outcome.reports.push(report);
        }

        if req.dry_run {
            return Ok(outcome);
        }

        for report in &outcome.reports {
            if let Some(entity) = doc.entity_mut(&report.id) {
                entity
                    .reference_assets
                    .retain(|a| !report.removed.contains(&a.asset_type));
            }
        }

        if req.prune_empty {
            let empty: Vec<String> = req
                .targets
                .keys()
                .filter(|id| doc.entity(id).is_some_and(|e| !e.has_any_assets()))
                .cloned()
                .collect();
            for id in empty {
                if doc.remove(&id) {
                    outcome.pruned.push(id);
                }
            }
        }

        self.save(&req.job_id, &doc).await?;
        tracing::info!(
            job_id = %req.job_id,
            removed = outcome.reports.iter().map(|r| r.removed.len()).sum::<usize>(),
            pruned = outcome.pruned.len(),
            "Cleaned reference assets"
        );
        Ok(outcome)
    }
}
