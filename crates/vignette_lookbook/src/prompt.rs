//! Prompt composition for reference-asset generation.

use std::fmt::Write;
use vignette_core::Entity;

fn canon_block(entity: &Entity) -> String {
    let compact = entity.visual_canon.compact();
    if compact.is_empty() {
        return String::new();
    }
    let mut block = String::from("\nVisual canon:\n");
    for (key, value) in &compact {
        // Write into a String cannot fail.
        let _ = writeln!(block, "- {key}: {value}");
    }
    block
}

fn theme_line(theme: Option<&str>) -> String {
    match theme {
        Some(t) if !t.trim().is_empty() => format!("\nOverall style theme: {t}."),
        _ => String::new(),
    }
}

/// Prompt for a character portrait: the anchor asset every other character
/// reference derives from.
pub fn portrait_prompt(entity: &Entity, theme: Option<&str>) -> String {
    format!(
        "Character reference portrait of {name}: head-and-shoulders, three-quarter view, \
         neutral expression, flat studio background, clean line art with full color. \
         Consistent, reusable character design sheet quality.{canon}{theme}",
        name = entity.display_name,
        canon = canon_block(entity),
        theme = theme_line(theme),
    )
}

/// Prompt for a character turnaround, composed against the portrait so the
/// design stays consistent.
pub fn turnaround_prompt(entity: &Entity, theme: Option<&str>) -> String {
    format!(
        "Full-body turnaround sheet of {name} matching the attached portrait exactly: \
         front, side, and back views on one sheet, same outfit, same proportions, flat \
         studio background.{canon}{theme}",
        name = entity.display_name,
        canon = canon_block(entity),
        theme = theme_line(theme),
    )
}

/// Prompt for a location establishing shot.
pub fn wide_prompt(entity: &Entity, theme: Option<&str>) -> String {
    format!(
        "Wide establishing shot of {name}: environment reference with clear layout, \
         landmark details, and consistent lighting, no characters in frame.{canon}{theme}",
        name = entity.display_name,
        canon = canon_block(entity),
        theme = theme_line(theme),
    )
}

/// Prompt for a prop study.
pub fn detail_prompt(entity: &Entity, theme: Option<&str>) -> String {
    format!(
        "Prop reference study of {name}: the object isolated on a flat background, shown \
         large and in detail from its most recognizable angle.{canon}{theme}",
        name = entity.display_name,
        canon = canon_block(entity),
        theme = theme_line(theme),
    )
}

/// Dispatch on asset type. Returns `None` for types with no generator prompt
/// (e.g. "cover", which is always user-supplied).
pub fn asset_prompt(asset_type: &str, entity: &Entity, theme: Option<&str>) -> Option<String> {
    match asset_type {
        "portrait" => Some(portrait_prompt(entity, theme)),
        "turnaround" => Some(turnaround_prompt(entity, theme)),
        "wide" => Some(wide_prompt(entity, theme)),
        "detail" => Some(detail_prompt(entity, theme)),
        _ => None,
    }
}
