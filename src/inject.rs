use log::{debug, trace};

use crate::config::{OverlayPosition, Settings};
use crate::dom::{NodeId, Page};

// ─── Overlay marker ──────────────────────────────────────────────────

/// Reserved class identifying the injected translation element. Text
/// extraction excludes anything carrying it, and detection skips it
/// outright, so the engine never re-translates its own output.
pub const OVERLAY_CLASS: &str = "subtitle-translation-overlay";

fn overlay_style(settings: &Settings) -> String {
    let mut style = format!(
        "display: block; color: #FFD700; font-size: {}px; margin-top: 4px; \
         text-align: center; text-shadow: 2px 2px 4px rgba(0,0,0,0.8);",
        settings.font_size
    );
    if settings.position == OverlayPosition::Overlay {
        style.push_str(" position: absolute; left: 0; right: 0;");
    }
    style
}

// ─── Render ──────────────────────────────────────────────────────────

/// Place or update the translation overlay next to `container`.
///
/// The overlay is always a sibling, never a child: the container's own
/// subtree is what the change signals watch, and it must stay untouched.
/// An existing marker sibling on the configured side is reused with its
/// text replaced; otherwise one is created lazily. Returns the overlay
/// node, or `None` when the container is no longer in the tree.
pub fn render(
    page: &mut Page,
    container: NodeId,
    translated: &str,
    settings: &Settings,
) -> Option<NodeId> {
    let parent = match page.parent(container) {
        Some(p) => p,
        None => {
            debug!("render: container detached, dropping translation");
            return None;
        }
    };

    let existing = match settings.position {
        OverlayPosition::Below | OverlayPosition::Overlay => page
            .next_sibling(container)
            .filter(|&n| page.has_class(n, OVERLAY_CLASS)),
        OverlayPosition::Above => page
            .prev_sibling(container)
            .filter(|&n| page.has_class(n, OVERLAY_CLASS)),
    };

    let overlay = match existing {
        Some(n) => n,
        None => {
            let n = page.create_element("div", &[OVERLAY_CLASS]);
            page.set_attribute(n, "style", &overlay_style(settings));
            match settings.position {
                OverlayPosition::Below | OverlayPosition::Overlay => {
                    let next = page.next_sibling(container);
                    page.insert_before(parent, n, next);
                }
                OverlayPosition::Above => {
                    page.insert_before(parent, n, Some(container));
                }
            }
            trace!("overlay element created next to container {}", container);
            n
        }
    };

    page.set_text(overlay, translated);
    Some(overlay)
}

/// Delete marker siblings on both sides of `container` (session teardown).
pub fn remove(page: &mut Page, container: NodeId) {
    for sibling in [page.next_sibling(container), page.prev_sibling(container)]
        .into_iter()
        .flatten()
    {
        if page.has_class(sibling, OVERLAY_CLASS) {
            debug!("removing overlay element {}", sibling);
            page.remove(sibling);
        }
    }
}
