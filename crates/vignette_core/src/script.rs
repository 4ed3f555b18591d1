//! Script units consumed by the renderer: pages, panels, and entity deltas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One panel of a comic page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// 1-based panel number within the page
    pub panel_number: u32,
    /// What to draw
    pub art_description: String,
    /// Spoken dialogue (may be empty)
    #[serde(default)]
    pub dialogue: String,
    /// Caption narration (may be empty)
    #[serde(default)]
    pub narration: String,
    /// Sound effects (may be empty)
    #[serde(default)]
    pub sfx: String,
    /// Panel-level character id overrides
    #[serde(default)]
    pub characters: Vec<String>,
    /// Panel-level prop id overrides
    #[serde(default)]
    pub props: Vec<String>,
    /// Panel-level location override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// One comic page: an ordered list of panels plus page-level entity refs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub page_number: u32,
    /// Ordered panels
    pub panels: Vec<Panel>,
    /// Page-level location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Page-level character ids
    #[serde(default)]
    pub characters: Vec<String>,
    /// Page-level prop ids
    #[serde(default)]
    pub props: Vec<String>,
}

impl Page {
    /// Union of all entity ids referenced anywhere on this page, page-level
    /// and every panel-level override. Empty strings are dropped.
    pub fn referenced_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        let mut push = |s: &str| {
            if !s.is_empty() {
                ids.insert(s.to_string());
            }
        };
        if let Some(loc) = &self.location_id {
            push(loc);
        }
        for c in &self.characters {
            push(c);
        }
        for p in &self.props {
            push(p);
        }
        for panel in &self.panels {
            for c in &panel.characters {
                push(c);
            }
            for p in &panel.props {
                push(p);
            }
            if let Some(loc) = &panel.location_id {
                push(loc);
            }
        }
        ids
    }
}

/// A new entity a generated script introduces, pending reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStub {
    /// Prefix-typed entity id
    pub id: String,
    /// Proposed display name
    pub display_name: String,
    /// Narrative role, if the writer declared one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Short free-text visual description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_stub: Option<String>,
}

/// The set of new entities a script introduces that must be merged into the
/// registry before rendering can proceed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptDelta {
    /// Characters to add
    #[serde(default)]
    pub characters_to_add: Vec<EntityStub>,
    /// Locations to add
    #[serde(default)]
    pub locations_to_add: Vec<EntityStub>,
    /// Props to add
    #[serde(default)]
    pub props_to_add: Vec<EntityStub>,
}

impl ScriptDelta {
    /// Whether the delta proposes anything.
    pub fn is_empty(&self) -> bool {
        self.characters_to_add.is_empty()
            && self.locations_to_add.is_empty()
            && self.props_to_add.is_empty()
    }

    /// Total number of proposed entities.
    pub fn len(&self) -> usize {
        self.characters_to_add.len() + self.locations_to_add.len() + self.props_to_add.len()
    }

    /// All stubs across sections.
    pub fn stubs(&self) -> impl Iterator<Item = &EntityStub> {
        self.characters_to_add
            .iter()
            .chain(self.locations_to_add.iter())
            .chain(self.props_to_add.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(n: u32, chars: &[&str], loc: Option<&str>) -> Panel {
        Panel {
            panel_number: n,
            art_description: "test".into(),
            dialogue: String::new(),
            narration: String::new(),
            sfx: String::new(),
            characters: chars.iter().map(|s| s.to_string()).collect(),
            props: Vec::new(),
            location_id: loc.map(str::to_string),
        }
    }

    #[test]
    fn referenced_ids_spans_page_and_panels() {
        let page = Page {
            page_number: 1,
            panels: vec![
                panel(1, &["char_a"], None),
                panel(2, &["char_b"], Some("loc_cellar")),
            ],
            location_id: Some("loc_harbor".into()),
            characters: vec!["char_a".into()],
            props: vec!["prop_map".into()],
        };
        let ids = page.referenced_ids();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains("loc_cellar"));
        assert!(ids.contains("prop_map"));
    }
}
