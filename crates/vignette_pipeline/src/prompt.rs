//! Page prompt composition.
//!
//! The prompt carries the script content, the registry slice for exactly the
//! entities this page uses, and explicit entity-to-reference-index bindings
//! so the model knows which attached image anchors which entity.

use std::collections::BTreeSet;
use std::fmt::Write;
use vignette_core::{ComicRequest, LookbookDoc, Page};

/// Compose the generation prompt for one page.
pub fn compose_page_prompt(
    request: &ComicRequest,
    page: &Page,
    doc: &LookbookDoc,
    ids: &BTreeSet<String>,
    binding_block: &str,
    chained: bool,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Comic page {} of {} for \"{}\". Art style: {}.",
        page.page_number,
        request.page_count(),
        request.comic_title,
        request.style
    );
    if let Some(theme) = doc.user_theme() {
        let _ = writeln!(prompt, "Overall theme: {theme}.");
    }
    if chained {
        let _ = writeln!(
            prompt,
            "Continue directly from the previous page (the first reference image): \
             keep staging, lighting, and character likeness consistent with it."
        );
    }

    let _ = writeln!(prompt, "\nEntities on this page:");
    for id in ids {
        let Some(entity) = doc.entity(id) else { continue };
        let _ = write!(prompt, "- {} ({})", entity.display_name, entity.id);
        let canon = entity.visual_canon.compact();
        if !canon.is_empty() {
            let attrs: Vec<String> = canon.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            let _ = write!(prompt, " — {}", attrs.join("; "));
        }
        let _ = writeln!(prompt);
    }

    if !binding_block.is_empty() {
        let _ = writeln!(prompt, "\n{binding_block}");
        let _ = writeln!(
            prompt,
            "Match each entity's appearance exactly to its bound reference image."
        );
    }

    let _ = writeln!(prompt, "\nPanels, in reading order:");
    for panel in &page.panels {
        let _ = write!(prompt, "Panel {}: {}", panel.panel_number, panel.art_description);
        if !panel.dialogue.is_empty() {
            let _ = write!(prompt, " Dialogue: {}", panel.dialogue);
        }
        if !panel.narration.is_empty() {
            let _ = write!(prompt, " Narration: {}", panel.narration);
        }
        if !panel.sfx.is_empty() {
            let _ = write!(prompt, " SFX: {}", panel.sfx);
        }
        let _ = writeln!(prompt);
    }
    let _ = write!(
        prompt,
        "\nRender all {} panels as one cohesive comic page with clear gutters \
         and integrated lettering.",
        page.panels.len()
    );
    prompt
}
