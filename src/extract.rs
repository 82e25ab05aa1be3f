use crate::dom::{NodeId, Page};
use crate::inject::OVERLAY_CLASS;

// ─── Original-text extraction ────────────────────────────────────────

/// Text of `node`'s subtree with every overlay-marked element excluded,
/// outer whitespace trimmed. Empty string when nothing remains.
///
/// The exclusion is what keeps the engine from feeding its own rendered
/// translations back through detection: even if a candidate element ends
/// up containing an overlay (a mutation target above the container, say),
/// the overlay's text never counts as source text. Read-only on the page.
pub fn original_text(page: &Page, node: NodeId) -> String {
    let mut out = String::new();
    collect(page, node, &mut out);
    out.trim().to_string()
}

fn collect(page: &Page, node: NodeId, out: &mut String) {
    if page.has_class(node, OVERLAY_CLASS) {
        return;
    }
    out.push_str(page.own_text(node));
    for &child in page.children(node) {
        collect(page, child, out);
    }
}
