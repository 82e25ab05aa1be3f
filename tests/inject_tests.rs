use nrk_subtitle_translator::config::{OverlayPosition, Settings};
use nrk_subtitle_translator::dom::Page;
use nrk_subtitle_translator::inject::{self, OVERLAY_CLASS};

fn caption_page() -> (Page, usize) {
    let mut page = Page::new();
    let root = page.root();
    let container = page.create_element("span", &["player-subtitle"]);
    page.append_child(root, container);
    page.set_text(container, "Hei");
    (page, container)
}

fn settings(position: OverlayPosition) -> Settings {
    Settings {
        position,
        font_size: 20,
        ..Settings::default()
    }
}

#[test]
fn overlay_is_created_as_next_sibling_below() {
    let (mut page, container) = caption_page();
    let overlay = inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Below))
        .expect("render succeeds");

    assert_eq!(page.next_sibling(container), Some(overlay));
    assert!(page.has_class(overlay, OVERLAY_CLASS));
    assert_eq!(page.text_content(overlay), "Hello");
    assert!(
        !page.contains(container, overlay),
        "overlay must never be a descendant of the container"
    );
}

#[test]
fn overlay_is_created_as_previous_sibling_above() {
    let (mut page, container) = caption_page();
    let overlay = inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Above))
        .expect("render succeeds");

    assert_eq!(page.prev_sibling(container), Some(overlay));
    assert!(!page.contains(container, overlay));
}

#[test]
fn repeated_renders_reuse_the_same_overlay() {
    let (mut page, container) = caption_page();
    let s = settings(OverlayPosition::Below);

    let first = inject::render(&mut page, container, "Hello", &s).unwrap();
    let second = inject::render(&mut page, container, "Thanks", &s).unwrap();

    assert_eq!(first, second, "text replaced in place, no second element");
    assert_eq!(page.text_content(second), "Thanks");
    let parent = page.parent(container).unwrap();
    let overlays = page
        .children(parent)
        .iter()
        .filter(|&&n| page.has_class(n, OVERLAY_CLASS))
        .count();
    assert_eq!(overlays, 1);
}

#[test]
fn container_children_are_never_touched() {
    let (mut page, container) = caption_page();
    let before = page.children(container).to_vec();
    inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Below)).unwrap();
    assert_eq!(page.children(container), before.as_slice());
    assert_eq!(page.text_content(container), "Hei");
}

#[test]
fn overlay_style_carries_configured_font_size() {
    let (mut page, container) = caption_page();
    let overlay =
        inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Below)).unwrap();
    let style = page.attribute(overlay, "style").expect("inline style set");
    assert!(style.contains("font-size: 20px"));
    assert!(style.contains("display: block"));
    assert!(style.contains("text-align: center"));
}

#[test]
fn overlay_position_variant_is_absolutely_positioned_below() {
    let (mut page, container) = caption_page();
    let overlay =
        inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Overlay)).unwrap();
    assert_eq!(page.next_sibling(container), Some(overlay));
    let style = page.attribute(overlay, "style").unwrap();
    assert!(style.contains("position: absolute"));
}

#[test]
fn render_against_detached_container_is_dropped() {
    let (mut page, container) = caption_page();
    page.remove(container);
    assert!(
        inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Below)).is_none()
    );
}

#[test]
fn remove_deletes_overlays_on_both_sides() {
    let (mut page, container) = caption_page();
    inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Below)).unwrap();
    inject::render(&mut page, container, "Hello", &settings(OverlayPosition::Above)).unwrap();

    inject::remove(&mut page, container);

    assert!(page.next_sibling(container).is_none());
    assert!(page.prev_sibling(container).is_none());
}
