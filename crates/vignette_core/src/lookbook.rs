//! The per-job lookbook document (entity registry).

use crate::{display_name_from_id, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vignette_error::{LookbookError, LookbookErrorKind, VignetteResult};

/// Current schema version written into new documents.
pub const LOOKBOOK_VERSION: &str = "1.0.0";

/// Per-job catalog of characters, locations, and props with canonical
/// descriptions and reference images. The single source of visual truth for
/// one job; never shared across jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookbookDoc {
    /// Schema version
    pub version: String,
    /// Character entities
    #[serde(default)]
    pub characters: Vec<Entity>,
    /// Location entities
    #[serde(default)]
    pub locations: Vec<Entity>,
    /// Prop entities
    #[serde(default)]
    pub props: Vec<Entity>,
    /// Free-form global style hints (e.g. a user theme string)
    #[serde(default)]
    pub style_profile: BTreeMap<String, String>,
}

impl Default for LookbookDoc {
    fn default() -> Self {
        Self {
            version: LOOKBOOK_VERSION.to_string(),
            characters: Vec::new(),
            locations: Vec::new(),
            props: Vec::new(),
            style_profile: BTreeMap::new(),
        }
    }
}

impl LookbookDoc {
    /// Create an empty document at the current schema version.
    pub fn new() -> Self {
        Self::default()
    }

    /// The section holding entities of `kind`.
    pub fn section(&self, kind: EntityKind) -> &[Entity] {
        match kind {
            EntityKind::Character => &self.characters,
            EntityKind::Location => &self.locations,
            EntityKind::Prop => &self.props,
        }
    }

    fn section_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Character => &mut self.characters,
            EntityKind::Location => &mut self.locations,
            EntityKind::Prop => &mut self.props,
        }
    }

    /// All entities across sections, characters first.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.characters
            .iter()
            .chain(self.locations.iter())
            .chain(self.props.iter())
    }

    /// Build an id index over all sections.
    pub fn index(&self) -> BTreeMap<&str, &Entity> {
        self.entities().map(|e| (e.id.as_str(), e)).collect()
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities().find(|e| e.id == id)
    }

    /// Look up an entity mutably by id.
    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.characters
            .iter_mut()
            .chain(self.locations.iter_mut())
            .chain(self.props.iter_mut())
            .find(|e| e.id == id)
    }

    /// Whether any section contains `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.entity(id).is_some()
    }

    /// Set a style-profile hint.
    pub fn set_style_hint(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.style_profile.insert(key.into(), value.into());
    }

    /// The user theme hint, if set.
    pub fn user_theme(&self) -> Option<&str> {
        self.style_profile.get("user_theme").map(String::as_str)
    }

    /// Create-or-merge an entity and return its index-stable id.
    ///
    /// Create when absent: display name from `name_hint` or a title-cased slug
    /// of the id, note from `note` or a placeholder. Merge when present: never
    /// overwrite a non-empty display name, merge `note` into the canon if
    /// given, backfill `created_from` only when empty. Idempotent for
    /// identical inputs.
    pub fn upsert(
        &mut self,
        id: &str,
        name_hint: Option<&str>,
        note: Option<&str>,
        created_from: &str,
    ) -> VignetteResult<&mut Entity> {
        let kind = EntityKind::from_id(id)?;
        let display_name = name_hint
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| display_name_from_id(id));

        if !self.contains(id) {
            let mut entity = Entity::new(id, display_name.clone(), created_from)?;
            match note {
                Some(n) if !n.trim().is_empty() => entity.visual_canon.set_note(n),
                _ => entity
                    .visual_canon
                    .set_note("Seeded; refine with a concept sheet."),
            }
            self.section_mut(kind).push(entity);
        }
        let Some(entity) = self.entity_mut(id) else {
            return Err(LookbookError::new(LookbookErrorKind::EntityNotFound(id.to_string())).into());
        };
        if entity.display_name.trim().is_empty() {
            entity.display_name = display_name;
        }
        if let Some(n) = note {
            if !n.trim().is_empty() {
                entity.visual_canon.set_note(n);
            }
        }
        if entity.visual_canon.note().is_none() {
            entity
                .visual_canon
                .set_note("Seeded; refine with a concept sheet.");
        }
        if entity.created_from.is_empty() {
            entity.created_from = created_from.to_string();
        }
        Ok(entity)
    }

    /// Remove an entity by id. Returns true when something was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let Ok(kind) = EntityKind::from_id(id) else {
            return false;
        };
        let section = self.section_mut(kind);
        let before = section.len();
        section.retain(|e| e.id != id);
        section.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent() {
        let mut doc = LookbookDoc::new();
        doc.upsert("char_roey", Some("Roey"), Some("red scarf"), "seed")
            .unwrap();
        let first = doc.clone();
        doc.upsert("char_roey", Some("Roey"), Some("red scarf"), "seed")
            .unwrap();
        assert_eq!(doc, first);
        assert_eq!(doc.characters.len(), 1);
    }

    #[test]
    fn upsert_never_clobbers_display_name() {
        let mut doc = LookbookDoc::new();
        doc.upsert("loc_harbor", Some("The Old Harbor"), None, "seed")
            .unwrap();
        doc.upsert("loc_harbor", Some("Harbor Mk2"), None, "delta")
            .unwrap();
        assert_eq!(doc.locations[0].display_name, "The Old Harbor");
    }

    #[test]
    fn upsert_defaults_name_from_slug() {
        let mut doc = LookbookDoc::new();
        doc.upsert("prop_brass_lantern", None, None, "seed").unwrap();
        assert_eq!(doc.props[0].display_name, "Brass Lantern");
        assert!(doc.props[0].visual_canon.note().is_some());
    }

    #[test]
    fn sections_route_by_prefix() {
        let mut doc = LookbookDoc::new();
        doc.upsert("char_a", None, None, "seed").unwrap();
        doc.upsert("loc_b", None, None, "seed").unwrap();
        doc.upsert("prop_c", None, None, "seed").unwrap();
        assert_eq!(doc.characters.len(), 1);
        assert_eq!(doc.locations.len(), 1);
        assert_eq!(doc.props.len(), 1);
        assert!(doc.upsert("widget_d", None, None, "seed").is_err());
    }
}
