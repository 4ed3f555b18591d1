//! Entity model: characters, locations, and props with reference assets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vignette_error::{LookbookError, LookbookErrorKind, VignetteResult};

/// The kind of a lookbook entity, determined once from the id prefix at load
/// time and carried explicitly from then on.
///
/// # Examples
///
/// ```
/// use vignette_core::EntityKind;
///
/// assert_eq!(EntityKind::from_id("char_mira").unwrap(), EntityKind::Character);
/// assert_eq!(EntityKind::from_id("loc_harbor").unwrap(), EntityKind::Location);
/// assert!(EntityKind::from_id("thing_x").is_err());
/// ```
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    /// A named character (`char_*`)
    Character,
    /// A named location (`loc_*`)
    Location,
    /// A named prop (`prop_*`)
    Prop,
}

impl EntityKind {
    /// Parse the kind from a prefix-typed id (`char_*`, `loc_*`, `prop_*`).
    pub fn from_id(id: &str) -> VignetteResult<Self> {
        if id.starts_with("char_") {
            Ok(Self::Character)
        } else if id.starts_with("loc_") {
            Ok(Self::Location)
        } else if id.starts_with("prop_") {
            Ok(Self::Prop)
        } else {
            Err(LookbookError::new(LookbookErrorKind::UnknownIdPrefix(id.to_string())).into())
        }
    }

    /// The id prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Character => "char_",
            Self::Location => "loc_",
            Self::Prop => "prop_",
        }
    }

    /// Default reference asset types required before a page using this entity
    /// can render. Characters need a portrait before a turnaround; the
    /// generator relies on this ordering.
    pub fn default_asset_types(&self) -> &'static [&'static str] {
        match self {
            Self::Character => &["portrait", "turnaround"],
            Self::Location => &["wide"],
            Self::Prop => &["detail"],
        }
    }
}

/// Derive a human-readable display name from a prefix-typed id.
///
/// # Examples
///
/// ```
/// use vignette_core::display_name_from_id;
///
/// assert_eq!(display_name_from_id("char_roey"), "Roey");
/// assert_eq!(display_name_from_id("loc_old_harbor"), "Old Harbor");
/// ```
pub fn display_name_from_id(id: &str) -> String {
    let slug = ["char_", "loc_", "prop_"]
        .iter()
        .find_map(|p| id.strip_prefix(p))
        .unwrap_or(id);
    let pretty = slug
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if pretty.is_empty() {
        id.to_string()
    } else {
        pretty
    }
}

/// An image bound to one entity and one asset type.
///
/// The `locator` is the stable, durable identity (it never expires); `url` is
/// a refreshable convenience value and may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAsset {
    /// Free-form tag: "portrait", "turnaround", "wide", "detail", "cover", ...
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Possibly time-limited retrieval URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Stable durable locator (authoritative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl ReferenceAsset {
    /// Create a new reference asset.
    pub fn new(
        asset_type: impl Into<String>,
        url: Option<String>,
        locator: Option<String>,
    ) -> Self {
        Self {
            asset_type: asset_type.into(),
            url,
            locator,
        }
    }

    /// The preferred retrieval source: stable locator first, URL second.
    pub fn best_source(&self) -> Option<&str> {
        self.locator
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.url.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Keys retained when compacting a visual canon for prompt inclusion.
const COMPACT_KEYS: &[&str] = &[
    "face",
    "hair",
    "body",
    "palette",
    "costume_variants",
    "emblems",
    "key_props",
    "lighting",
    "negative_traits",
    "notes",
];

/// Open string-keyed map of free-form visual attributes.
///
/// Deliberately extensible; typed accessors keep callers from scattering raw
/// key lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualCanon(BTreeMap<String, String>);

impl VisualCanon {
    /// Create an empty canon.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The free-text notes attribute.
    pub fn note(&self) -> Option<&str> {
        self.get("notes")
    }

    /// Set the free-text notes attribute.
    pub fn set_note(&mut self, note: impl Into<String>) {
        self.set("notes", note);
    }

    /// Whether any attributes are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy restricted to the prompt-relevant key subset.
    pub fn compact(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter(|(k, _)| COMPACT_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A lookbook entity: one character, location, or prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable prefix-typed id (`char_*`, `loc_*`, `prop_*`)
    pub id: String,
    /// Kind, parsed once from the id prefix
    pub kind: EntityKind,
    /// Human-readable name
    pub display_name: String,
    /// Optional narrative role (characters only, informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Open visual attribute map
    #[serde(default)]
    pub visual_canon: VisualCanon,
    /// Ordered reference assets; at most one per asset type
    #[serde(default)]
    pub reference_assets: Vec<ReferenceAsset>,
    /// Provenance tag (e.g. "seed", "script_delta")
    #[serde(default)]
    pub created_from: String,
}

impl Entity {
    /// Create a new entity with no assets. Fails on an unrecognized id prefix
    /// or a prefix that disagrees with `kind`.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        created_from: impl Into<String>,
    ) -> VignetteResult<Self> {
        let id = id.into();
        let kind = EntityKind::from_id(&id)?;
        Ok(Self {
            id,
            kind,
            display_name: display_name.into(),
            role: None,
            visual_canon: VisualCanon::new(),
            reference_assets: Vec::new(),
            created_from: created_from.into(),
        })
    }

    /// Whether any reference asset exists.
    pub fn has_any_assets(&self) -> bool {
        !self.reference_assets.is_empty()
    }

    /// Look up the current asset of a type, if present.
    pub fn asset(&self, asset_type: &str) -> Option<&ReferenceAsset> {
        self.reference_assets
            .iter()
            .find(|a| a.asset_type == asset_type)
    }

    /// Replace any existing asset of the same type with `asset`.
    /// Regeneration replaces rather than appends.
    pub fn replace_asset(&mut self, asset: ReferenceAsset) {
        self.reference_assets
            .retain(|a| a.asset_type != asset.asset_type);
        self.reference_assets.push(asset);
    }

    /// Attach a cover asset only if no cover-typed asset exists yet.
    pub fn attach_cover_once(&mut self, cover: &ReferenceAsset) {
        if self.asset("cover").is_none() {
            self.reference_assets.push(cover.clone());
        }
    }

    /// Asset types from the kind's default set that are still missing.
    pub fn missing_default_types(&self) -> Vec<&'static str> {
        self.kind
            .default_asset_types()
            .iter()
            .filter(|t| self.asset(t).is_none())
            .copied()
            .collect()
    }
}
