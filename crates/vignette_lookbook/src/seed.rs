//! Idempotent lookbook seeding.
//!
//! Seeding registers the entity ids a job starts with, before any script
//! exists. Re-delivery of the same seed request is harmless: existing entries
//! are merged, never clobbered.

use crate::LookbookStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vignette_core::{LookbookDoc, ReferenceAsset};
use vignette_error::VignetteResult;

/// A request to seed (or re-seed) a job's lookbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedRequest {
    /// Job whose registry to seed
    pub job_id: String,
    /// Character ids (`char_*`)
    #[serde(default)]
    pub character_ids: Vec<String>,
    /// Location ids (`loc_*`)
    #[serde(default)]
    pub location_ids: Vec<String>,
    /// Prop ids (`prop_*`)
    #[serde(default)]
    pub prop_ids: Vec<String>,
    /// Optional display-name hints by id
    #[serde(default)]
    pub name_hints: BTreeMap<String, String>,
    /// Optional visual notes by id
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
    /// Optional cover image URL to attach to every seeded entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Optional stable cover locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_locator: Option<String>,
    /// Optional user theme, recorded in the style profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_theme: Option<String>,
}

impl SeedRequest {
    /// All ids in section order: characters, locations, props.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.character_ids
            .iter()
            .chain(self.location_ids.iter())
            .chain(self.prop_ids.iter())
    }

    fn cover(&self) -> Option<ReferenceAsset> {
        if self.cover_url.is_none() && self.cover_locator.is_none() {
            return None;
        }
        Some(ReferenceAsset::new(
            "cover",
            self.cover_url.clone(),
            self.cover_locator.clone(),
        ))
    }
}

/// What a seed call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOutcome {
    /// Ids newly created by this call
    pub created: Vec<String>,
    /// Ids that already existed and were merged
    pub merged: Vec<String>,
}

impl LookbookStore {
    /// Seed a job's lookbook: create-or-merge every requested entity, attach
    /// the cover image once per entity, and record the user theme.
    ///
    /// # Errors
    ///
    /// Fails on an id with an unrecognized kind prefix, or when the document
    /// cannot be persisted.
    #[tracing::instrument(skip(self, req), fields(job_id = %req.job_id))]
    pub async fn seed(&self, req: &SeedRequest) -> VignetteResult<SeedOutcome> {
        let mut doc = self.load(&req.job_id).await;
        let outcome = seed_into(&mut doc, req)?;
        self.save(&req.job_id, &doc).await?;
        tracing::info!(
            job_id = %req.job_id,
            created = outcome.created.len(),
            merged = outcome.merged.len(),
            "Seeded lookbook"
        );
        Ok(outcome)
    }
}

/// Apply a seed request to an in-memory document.
pub fn seed_into(doc: &mut LookbookDoc, req: &SeedRequest) -> VignetteResult<SeedOutcome> {
    let cover = req.cover();
    let mut created = Vec::new();
    let mut merged = Vec::new();

    for id in req.ids() {
        if doc.contains(id) {
            merged.push(id.clone());
        } else {
            created.push(id.clone());
        }
        let entity = doc.upsert(
            id,
            req.name_hints.get(id).map(String::as_str),
            req.notes.get(id).map(String::as_str),
            "seed",
        )?;
        if let Some(cover) = &cover {
            entity.attach_cover_once(cover);
        }
    }

    if let Some(theme) = req.user_theme.as_deref().filter(|t| !t.trim().is_empty()) {
        doc.set_style_hint("user_theme", theme);
    }
    Ok(SeedOutcome { created, merged })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SeedRequest {
        SeedRequest {
            job_id: "j1".into(),
            character_ids: vec!["char_mira".into()],
            prop_ids: vec!["prop_lantern".into()],
            name_hints: BTreeMap::from([("char_mira".to_string(), "Mira".to_string())]),
            cover_locator: Some("covers/c1.png".into()),
            user_theme: Some("gaslamp noir".into()),
            ..SeedRequest::default()
        }
    }

    #[test]
    fn seed_creates_then_merges() {
        let mut doc = LookbookDoc::new();
        let first = seed_into(&mut doc, &request()).unwrap();
        assert_eq!(first.created.len(), 2);
        assert!(first.merged.is_empty());

        let second = seed_into(&mut doc, &request()).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.merged.len(), 2);
        assert_eq!(doc.entities().count(), 2);
    }

    #[test]
    fn cover_attaches_once_per_entity() {
        let mut doc = LookbookDoc::new();
        seed_into(&mut doc, &request()).unwrap();
        seed_into(&mut doc, &request()).unwrap();
        let mira = doc.entity("char_mira").unwrap();
        assert_eq!(
            mira.reference_assets
                .iter()
                .filter(|a| a.asset_type == "cover")
                .count(),
            1
        );
    }

    #[test]
    fn theme_lands_in_style_profile() {
        let mut doc = LookbookDoc::new();
        seed_into(&mut doc, &request()).unwrap();
        assert_eq!(doc.user_theme(), Some("gaslamp noir"));
    }
}
