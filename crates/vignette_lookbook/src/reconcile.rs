//! Script/delta reconciliation.
//!
//! A generated script may reference entities the registry has never seen.
//! The audit counts how often each unknown id actually recurs and promotes
//! only the ones that clear the configured thresholds; one-off background
//! mentions stay anonymous. Promoted stubs are merged via the same
//! create-or-merge path seeding uses, so reconciliation is idempotent.

use crate::LookbookStore;
use std::collections::{BTreeMap, BTreeSet};
use vignette_core::{EntityKind, EntityStub, LookbookDoc, Page, ScriptDelta, UsageThresholds};
use vignette_error::{GenerationError, GenerationErrorKind, VignetteResult};
use vignette_interface::ScriptDriver;

/// Usage counters for one unregistered id across a script.
#[derive(Debug, Clone, Copy, Default)]
struct Usage {
    /// Panel-level references (a page-level reference counts once per panel
    /// on that page, since it applies to the whole page)
    panels: usize,
    /// Page-level uses (locations only)
    page_level: usize,
    /// Distinct pages the id appears on
    page_spread: usize,
}

/// Threshold-driven audit of script entity usage.
#[derive(Debug, Clone, Copy)]
pub struct UsageAudit {
    thresholds: UsageThresholds,
}

impl UsageAudit {
    /// Audit with the given promotion thresholds.
    pub fn new(thresholds: UsageThresholds) -> Self {
        Self { thresholds }
    }

    /// Derive the delta of unknown ids that recur often enough to deserve a
    /// registry entry. Ids with unrecognized prefixes are logged and skipped.
    #[tracing::instrument(skip_all, fields(pages = pages.len()))]
    pub fn derive_delta(&self, pages: &[Page], known: &BTreeSet<String>) -> ScriptDelta {
        let usage = collect_usage(pages, known);
        let mut delta = ScriptDelta::default();

        for (id, usage) in usage {
            let Ok(kind) = EntityKind::from_id(&id) else {
                tracing::warn!(id, "Script references id with unknown prefix, skipping");
                continue;
            };
            if !self.qualifies(kind, usage) {
                tracing::debug!(id, "Below promotion threshold, staying anonymous");
                continue;
            }
            let stub = EntityStub {
                display_name: vignette_core::display_name_from_id(&id),
                id,
                role: None,
                visual_stub: None,
            };
            match kind {
                EntityKind::Character => delta.characters_to_add.push(stub),
                EntityKind::Location => delta.locations_to_add.push(stub),
                EntityKind::Prop => delta.props_to_add.push(stub),
            }
        }
        tracing::info!(promoted = delta.len(), "Derived script delta");
        delta
    }

    fn qualifies(&self, kind: EntityKind, usage: Usage) -> bool {
        match kind {
            EntityKind::Character => usage.panels >= *self.thresholds.character_panels(),
            EntityKind::Prop => usage.panels >= *self.thresholds.prop_panels(),
            EntityKind::Location => {
                usage.page_level >= *self.thresholds.location_pages()
                    || (usage.panels >= *self.thresholds.location_panels()
                        && usage.page_spread >= *self.thresholds.location_page_spread())
            }
        }
    }
}

fn collect_usage(pages: &[Page], known: &BTreeSet<String>) -> BTreeMap<String, Usage> {
    let mut usage: BTreeMap<String, Usage> = BTreeMap::new();
    let mut seen_on_page: BTreeSet<String> = BTreeSet::new();

    for page in pages {
        seen_on_page.clear();
        let panel_count = page.panels.len().max(1);

        let touch = |usage: &mut BTreeMap<String, Usage>,
                     seen: &mut BTreeSet<String>,
                     id: &str,
                     panels: usize,
                     page_level: usize| {
            if id.is_empty() || known.contains(id) {
                return;
            }
            let entry = usage.entry(id.to_string()).or_default();
            entry.panels += panels;
            entry.page_level += page_level;
            if seen.insert(id.to_string()) {
                entry.page_spread += 1;
            }
        };

        // Page-level characters and props apply to every panel on the page.
        for id in &page.characters {
            touch(&mut usage, &mut seen_on_page, id, panel_count, 0);
        }
        for id in &page.props {
            touch(&mut usage, &mut seen_on_page, id, panel_count, 0);
        }
        if let Some(loc) = &page.location_id {
            touch(&mut usage, &mut seen_on_page, loc, 0, 1);
        }

        for panel in &page.panels {
            for id in &panel.characters {
                touch(&mut usage, &mut seen_on_page, id, 1, 0);
            }
            for id in &panel.props {
                touch(&mut usage, &mut seen_on_page, id, 1, 0);
            }
            if let Some(loc) = &panel.location_id {
                touch(&mut usage, &mut seen_on_page, loc, 1, 0);
            }
        }
    }
    usage
}

/// Merge a delta into an in-memory document. Returns the ids newly created;
/// existing entries are merged without clobbering.
pub fn merge_delta(doc: &mut LookbookDoc, delta: &ScriptDelta) -> VignetteResult<Vec<String>> {
    let mut created = Vec::new();
    for stub in delta.stubs() {
        if !doc.contains(&stub.id) {
            created.push(stub.id.clone());
        }
        let entity = doc.upsert(
            &stub.id,
            Some(&stub.display_name),
            stub.visual_stub.as_deref(),
            "script_delta",
        )?;
        if entity.role.is_none() {
            entity.role = stub.role.clone();
        }
    }
    Ok(created)
}

impl LookbookStore {
    /// Merge a script delta into a job's persisted lookbook.
    ///
    /// # Errors
    ///
    /// Fails when the registry has not been seeded, a stub id has an
    /// unrecognized prefix, or the document cannot be persisted.
    #[tracing::instrument(skip(self, delta), fields(stubs = delta.len()))]
    pub async fn apply_delta(
        &self,
        job_id: &str,
        delta: &ScriptDelta,
    ) -> VignetteResult<LookbookDoc> {
        let mut doc = self.load_required(job_id).await?;
        let created = merge_delta(&mut doc, delta)?;
        if !created.is_empty() {
            tracing::info!(job_id, created = created.len(), "Promoted script entities");
        }
        self.save(job_id, &doc).await?;
        Ok(doc)
    }
}

/// Ids referenced anywhere in `pages` that are neither registered nor
/// promoted by `delta`. A non-empty result means the script is internally
/// inconsistent and a repair pass is warranted.
pub fn unknown_ids(
    pages: &[Page],
    known: &BTreeSet<String>,
    delta: &ScriptDelta,
) -> BTreeSet<String> {
    let promoted: BTreeSet<&str> = delta.stubs().map(|s| s.id.as_str()).collect();
    pages
        .iter()
        .flat_map(|p| p.referenced_ids())
        .filter(|id| !known.contains(id) && !promoted.contains(id.as_str()))
        .collect()
}

/// One-shot script repair: ask the structured-text driver to rewrite the
/// pages so that every entity reference resolves against the allowed id set.
///
/// Callers treat a failure here as non-fatal and keep the original pages;
/// unresolved ids then simply render without references or block the chain,
/// depending on configuration.
///
/// # Errors
///
/// Fails when the driver call fails or returns JSON that does not parse as a
/// page list.
#[tracing::instrument(skip_all, fields(unknown = unknown.len()))]
pub async fn repair_pages(
    driver: &dyn ScriptDriver,
    pages: &[Page],
    known: &BTreeSet<String>,
    unknown: &BTreeSet<String>,
) -> VignetteResult<Vec<Page>> {
    let allowed: Vec<&str> = known.iter().map(String::as_str).collect();
    let stray: Vec<&str> = unknown.iter().map(String::as_str).collect();
    let prompt = format!(
        "Rewrite the following comic script pages with minimal edits so that every \
         character, location, and prop id is drawn from the allowed set. Replace each \
         stray id with the closest allowed id, or drop the reference if none fits. Do \
         not change page or panel structure, dialogue, or art descriptions.\n\n\
         Allowed ids: {}\nStray ids: {}\n\nPages:\n{}",
        allowed.join(", "),
        stray.join(", "),
        serde_json::to_string(pages)
            .map_err(|e| GenerationError::new(GenerationErrorKind::SchemaViolation(e.to_string())))?
    );
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "pages": { "type": "array" }
        },
        "required": ["pages"]
    });

    let value = driver.generate_structured(&prompt, &schema).await?;
    let repaired = value
        .get("pages")
        .cloned()
        .ok_or_else(|| {
            GenerationError::new(GenerationErrorKind::SchemaViolation(
                "repair response missing 'pages'".to_string(),
            ))
        })?;
    let repaired: Vec<Page> = serde_json::from_value(repaired)
        .map_err(|e| GenerationError::new(GenerationErrorKind::SchemaViolation(e.to_string())))?;
    if repaired.len() != pages.len() {
        return Err(GenerationError::new(GenerationErrorKind::SchemaViolation(format!(
            "repair changed page count: {} != {}",
            repaired.len(),
            pages.len()
        )))
        .into());
    }
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vignette_core::Panel;

    fn panel(n: u32, chars: &[&str], props: &[&str], loc: Option<&str>) -> Panel {
        Panel {
            panel_number: n,
            art_description: "x".into(),
            dialogue: String::new(),
            narration: String::new(),
            sfx: String::new(),
            characters: chars.iter().map(|s| s.to_string()).collect(),
            props: props.iter().map(|s| s.to_string()).collect(),
            location_id: loc.map(str::to_string),
        }
    }

    fn page(n: u32, panels: Vec<Panel>, loc: Option<&str>) -> Page {
        Page {
            page_number: n,
            panels,
            location_id: loc.map(str::to_string),
            characters: Vec::new(),
            props: Vec::new(),
        }
    }

    #[test]
    fn recurring_character_is_promoted_one_off_is_not() {
        let pages = vec![
            page(1, vec![panel(1, &["char_new", "char_once"], &[], None)], None),
            page(2, vec![panel(1, &["char_new"], &[], None)], None),
        ];
        let audit = UsageAudit::new(UsageThresholds::default());
        let delta = audit.derive_delta(&pages, &BTreeSet::new());
        let ids: Vec<&str> = delta.stubs().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["char_new"]);
    }

    #[test]
    fn page_level_location_qualifies_outright() {
        let pages = vec![page(1, vec![panel(1, &[], &[], None)], Some("loc_dock"))];
        let audit = UsageAudit::new(UsageThresholds::default());
        let delta = audit.derive_delta(&pages, &BTreeSet::new());
        assert_eq!(delta.locations_to_add.len(), 1);
    }

    #[test]
    fn panel_location_needs_spread_across_pages() {
        let same_page = vec![page(
            1,
            vec![
                panel(1, &[], &[], Some("loc_cellar")),
                panel(2, &[], &[], Some("loc_cellar")),
            ],
            None,
        )];
        let audit = UsageAudit::new(UsageThresholds::default());
        assert!(audit
            .derive_delta(&same_page, &BTreeSet::new())
            .locations_to_add
            .is_empty());

        let spread = vec![
            page(1, vec![panel(1, &[], &[], Some("loc_cellar"))], None),
            page(2, vec![panel(1, &[], &[], Some("loc_cellar"))], None),
        ];
        assert_eq!(
            audit
                .derive_delta(&spread, &BTreeSet::new())
                .locations_to_add
                .len(),
            1
        );
    }

    #[test]
    fn known_ids_are_ignored() {
        let pages = vec![
            page(1, vec![panel(1, &["char_mira"], &[], None)], None),
            page(2, vec![panel(1, &["char_mira"], &[], None)], None),
        ];
        let known = BTreeSet::from(["char_mira".to_string()]);
        let audit = UsageAudit::new(UsageThresholds::default());
        assert!(audit.derive_delta(&pages, &known).is_empty());
    }

    #[test]
    fn unknown_ids_excludes_promoted_stubs() {
        let pages = vec![page(
            1,
            vec![panel(1, &["char_a", "char_b"], &[], None)],
            None,
        )];
        let known = BTreeSet::from(["char_a".to_string()]);
        let mut delta = ScriptDelta::default();
        delta.characters_to_add.push(EntityStub {
            id: "char_b".into(),
            display_name: "B".into(),
            role: None,
            visual_stub: None,
        });
        assert!(unknown_ids(&pages, &known, &delta).is_empty());
    }

    #[test]
    fn merge_delta_is_idempotent() {
        let mut doc = LookbookDoc::new();
        let mut delta = ScriptDelta::default();
        delta.props_to_add.push(EntityStub {
            id: "prop_map".into(),
            display_name: "Map".into(),
            role: None,
            visual_stub: Some("weathered parchment".into()),
        });
        let created = merge_delta(&mut doc, &delta).unwrap();
        assert_eq!(created, vec!["prop_map".to_string()]);
        let again = merge_delta(&mut doc, &delta).unwrap();
        assert!(again.is_empty());
        assert_eq!(doc.props.len(), 1);
    }
}
