use log::{trace, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

// ─── Node / record types ─────────────────────────────────────────────

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes,
}

/// One observed change. Mirrors the platform mutation record: a kind,
/// the node it happened on, and any nodes added by a child-list change.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

/// Structural selector, ordered most-specific-first by the caller.
#[derive(Debug, Clone)]
pub enum Selector {
    /// `tag[class*="fragment"]`
    TagClassContains { tag: String, fragment: String },
    /// `.class`
    Class(String),
}

impl Selector {
    pub fn tag_class_contains(tag: &str, fragment: &str) -> Self {
        Selector::TagClassContains {
            tag: tag.to_string(),
            fragment: fragment.to_string(),
        }
    }

    pub fn class(name: &str) -> Self {
        Selector::Class(name.to_string())
    }
}

struct Node {
    tag: String,
    classes: Vec<String>,
    attrs: HashMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// ─── Page ────────────────────────────────────────────────────────────

/// In-memory stand-in for the host page's DOM region. The host page owns
/// the real tree; the engine only ever queries it, watches it, and inserts
/// sibling overlay nodes. Mutations are reported to at most one observer,
/// scoped to a subtree, batched like platform mutation records.
pub struct Page {
    nodes: Vec<Node>,
    observer: Option<(NodeId, UnboundedSender<Vec<MutationRecord>>)>,
    pending: Vec<MutationRecord>,
    batch_depth: usize,
}

impl Page {
    pub fn new() -> Self {
        let root = Node {
            tag: "body".to_string(),
            classes: Vec::new(),
            attrs: HashMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            observer: None,
            pending: Vec::new(),
            batch_depth: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    // ── Construction / mutation ──────────────────────────────────────

    /// Create a detached element. It joins the tree via `append_child` or
    /// `insert_before`.
    pub fn create_element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attrs: HashMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` under `parent`, before `reference` (or at the end
    /// when `reference` is `None` or not a child of `parent`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let index = match reference {
            Some(r) => match self.nodes[parent].children.iter().position(|&c| c == r) {
                Some(i) => i,
                None => {
                    warn!("insert_before: reference {} is not a child of {}, appending", r, parent);
                    self.nodes[parent].children.len()
                }
            },
            None => self.nodes[parent].children.len(),
        };
        self.nodes[parent].children.insert(index, child);
        self.nodes[child].parent = Some(parent);
        self.record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            added: vec![child],
        });
    }

    /// Remove a node from its parent. The node itself stays in the arena
    /// (handles held by in-flight work must not dangle) but is detached.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent {
            self.detach(node);
            self.record(MutationRecord {
                kind: MutationKind::ChildList,
                target: parent,
                added: Vec::new(),
            });
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node].text = text.to_string();
        self.record(MutationRecord {
            kind: MutationKind::CharacterData,
            target: node,
            added: Vec::new(),
        });
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node]
            .attrs
            .insert(name.to_string(), value.to_string());
        self.record(MutationRecord {
            kind: MutationKind::Attributes,
            target: node,
            added: Vec::new(),
        });
    }

    /// Group several mutations into one delivered record batch, the way
    /// the platform delivers all records from one microtask together.
    pub fn batch(&mut self, f: impl FnOnce(&mut Page)) {
        self.batch_depth += 1;
        f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.flush();
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node].tag
    }

    /// Coarse element kind used as half of the identity key.
    pub fn element_kind(&self, node: NodeId) -> String {
        self.nodes[node].tag.to_uppercase()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node].classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node].attrs.get(name).map(|s| s.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node].parent?;
        let siblings = &self.nodes[parent].children;
        let i = siblings.iter().position(|&c| c == node)?;
        siblings.get(i + 1).copied()
    }

    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node].parent?;
        let siblings = &self.nodes[parent].children;
        let i = siblings.iter().position(|&c| c == node)?;
        if i == 0 {
            None
        } else {
            siblings.get(i - 1).copied()
        }
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        node == self.root() || self.nodes[node].parent.is_some()
    }

    /// Whether `node` is `ancestor` or lies inside its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.nodes[n].parent;
        }
        false
    }

    /// The node's own text, not including descendants.
    pub fn own_text(&self, node: NodeId) -> &str {
        &self.nodes[node].text
    }

    /// Concatenated text of the node's subtree, document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.nodes[node].text);
        for &child in &self.nodes[node].children {
            self.collect_text(child, out);
        }
    }

    // ── Selector matching ────────────────────────────────────────────

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        let n = &self.nodes[node];
        match selector {
            Selector::TagClassContains { tag, fragment } => {
                n.tag == *tag && n.classes.iter().any(|c| c.contains(fragment.as_str()))
            }
            Selector::Class(name) => n.classes.iter().any(|c| c == name),
        }
    }

    /// Depth-first, first match under the root.
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_under(self.root(), selector)
    }

    fn query_under(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        if node != self.root() && self.matches(node, selector) {
            return Some(node);
        }
        for &child in &self.nodes[node].children {
            if let Some(found) = self.query_under(child, selector) {
                return Some(found);
            }
        }
        None
    }

    /// First element matching any selector, tried most-specific-first.
    pub fn query_first(&self, selectors: &[Selector]) -> Option<NodeId> {
        selectors.iter().find_map(|s| self.query_selector(s))
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Attach the single observer, scoped to `root`'s subtree. Replaces
    /// any previous observer.
    pub fn observe(&mut self, root: NodeId, sender: UnboundedSender<Vec<MutationRecord>>) {
        trace!("observer attached to node {}", root);
        self.observer = Some((root, sender));
    }

    pub fn disconnect(&mut self) {
        trace!("observer disconnected");
        self.observer = None;
        self.pending.clear();
    }

    fn record(&mut self, rec: MutationRecord) {
        let in_scope = match &self.observer {
            Some((root, _)) => self.contains(*root, rec.target),
            None => return,
        };
        if !in_scope {
            return;
        }
        self.pending.push(rec);
        if self.batch_depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        if let Some((_, sender)) = &self.observer {
            // Receiver gone means the session is tearing down; drop silently.
            let _ = sender.send(batch);
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Caption container selectors ─────────────────────────────────────

/// Ordered by specificity: the streaming site's own subtitle span first,
/// then progressively more generic player classes.
pub fn caption_selectors() -> Vec<Selector> {
    vec![
        Selector::tag_class_contains("span", "subtitle"),
        Selector::class("nrk-subtitle"),
        Selector::class("video-subtitle"),
        Selector::class("vjs-text-track-display"),
    ]
}
