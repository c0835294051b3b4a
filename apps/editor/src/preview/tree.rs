//! Headless render tree: an arena of element and text nodes standing in for the
//! preview DOM.
//!
//! Nodes are never freed: detaching a node clears its parent link and leaves it in the
//! arena, so a stale `NodeId` held by a selection can be detected with `is_attached`.
//! Text offsets are counted in `char`s.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::Serialize;

use crate::format::attributes::ResolvedStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Identity of one tree instance. Every render and every clone gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TreeId(u64);

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

impl TreeId {
    fn next() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A node handle that remembers which tree it came from, so it can be held across
/// re-renders without aliasing a node of a newer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub tree: TreeId,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Root,
    Section,
    Heading,
    Entry,
    Line,
    ListItem,
    Field,
    Strong,
    Emphasis,
    Underline,
    Span,
}

impl Tag {
    /// Inline marks inserted by the formatting applicator.
    pub fn is_inline_mark(self) -> bool {
        matches!(self, Tag::Strong | Tag::Emphasis | Tag::Underline | Tag::Span)
    }

    /// Elements that lay out as their own line box(es).
    pub fn is_line_box(self) -> bool {
        matches!(self, Tag::Heading | Tag::Line | Tag::ListItem)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Element {
    pub tag: Tag,
    pub attrs: BTreeMap<String, String>,
    /// Computed style for field elements (effective formatting of the field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ResolvedStyle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Element(Element),
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewTree {
    #[serde(skip)]
    id: TreeId,
    nodes: Vec<Node>,
    root: NodeId,
    /// Bumped on every structural change or text edit.
    #[serde(skip)]
    mutations: u64,
}

impl Default for PreviewTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewTree {
    pub fn new() -> Self {
        let mut tree = Self {
            id: TreeId::next(),
            nodes: Vec::new(),
            root: NodeId(0),
            mutations: 0,
        };
        tree.root = tree.create_element(Tag::Root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_ref(&self, node: NodeId) -> NodeRef {
        NodeRef {
            tree: self.id,
            node,
        }
    }

    /// Resolves a handle back to a node of this tree, if it still belongs here and is
    /// attached.
    pub fn resolve(&self, handle: NodeRef) -> Option<NodeId> {
        (handle.tree == self.id && self.is_attached(handle.node)).then_some(handle.node)
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.get(id)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.element(id).map(|el| el.tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attrs.get(name).map(String::as_str)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Text { text } => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    // ── construction ────────────────────────────────────────────────────────

    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag,
            attrs: BTreeMap::new(),
            style: None,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text {
            text: text.to_string(),
        })
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_string(), value.into());
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let position = self.children(parent).len();
        self.insert_child(parent, position, child);
    }

    /// Inserts `child` at `position` under `parent`, detaching it from any old parent.
    pub fn insert_child(&mut self, parent: NodeId, position: usize, child: NodeId) {
        if self.get(parent).is_none() || self.get(child).is_none() || parent == child {
            return;
        }
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let position = position.min(children.len());
        children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
        self.mutations += 1;
    }

    /// Unlinks `id` from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
        self.mutations += 1;
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// True when `id` is connected to the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // ── traversal ──────────────────────────────────────────────────────────

    /// `id` followed by its ancestors up to the top of its tree.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).map(|_| id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.get(id).is_none() {
            return out;
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Nearest common ancestor of two nodes, if they share a tree.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let chain_a = self.ancestors(a);
        self.ancestors(b)
            .into_iter()
            .find(|candidate| chain_a.contains(candidate))
    }

    /// Document order of two attached nodes. Ancestors sort before descendants.
    pub fn compare_order(&self, a: NodeId, b: NodeId) -> Ordering {
        self.path_from_root(a).cmp(&self.path_from_root(b))
    }

    fn path_from_root(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = self
            .ancestors(id)
            .into_iter()
            .filter_map(|n| self.index_in_parent(n))
            .collect();
        path.reverse();
        path
    }

    // ── editing ─────────────────────────────────────────────────────────────

    /// Splits an attached text node at `offset` chars and returns the right half,
    /// inserted as the next sibling. Returns `None` for a split at either end.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?.to_string();
        let len = text.chars().count();
        if offset == 0 || offset >= len {
            return None;
        }
        let parent = self.parent(id)?;
        let position = self.index_in_parent(id)?;
        let byte = text.char_indices().nth(offset).map(|(b, _)| b)?;

        let right = self.create_text(&text[byte..]);
        if let NodeKind::Text { text } = &mut self.nodes[id.0].kind {
            text.truncate(byte);
        }
        self.insert_child(parent, position + 1, right);
        Some(right)
    }

    /// Wraps `id` in a new element of `tag` placed where `id` was.
    pub fn wrap(&mut self, id: NodeId, tag: Tag) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.index_in_parent(id)?;
        let wrapper = self.create_element(tag);
        self.insert_child(parent, position, wrapper);
        self.append_child(wrapper, id);
        Some(wrapper)
    }

    /// Replaces element `id` with its children.
    pub fn unwrap(&mut self, id: NodeId) {
        let (Some(parent), Some(position)) = (self.parent(id), self.index_in_parent(id)) else {
            return;
        };
        let children = self.children(id).to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, position + 1 + offset, child);
        }
        self.detach(id);
    }

    /// Copies the subtree under `id` into a fresh tree whose root is the copy.
    ///
    /// The copy shares nothing with `self`, so measuring it can never disturb (or be
    /// observed as a mutation of) the live preview.
    pub fn clone_subtree(&self, id: NodeId) -> PreviewTree {
        let mut out = PreviewTree {
            id: TreeId::next(),
            nodes: Vec::new(),
            root: NodeId(0),
            mutations: 0,
        };
        if let Some(node) = self.get(id) {
            let root = out.push(node.kind.clone());
            out.root = root;
            self.copy_children(id, &mut out, root);
        } else {
            out.root = out.create_element(Tag::Root);
        }
        out
    }

    fn copy_children(&self, from: NodeId, out: &mut PreviewTree, to: NodeId) {
        for &child in self.children(from) {
            let copy = out.push(self.nodes[child.0].kind.clone());
            out.nodes[to.0].children.push(copy);
            out.nodes[copy.0].parent = Some(to);
            self.copy_children(child, out, copy);
        }
    }
}
