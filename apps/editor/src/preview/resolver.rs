//! Field Resolver: maps a live selection or a click target back to a `FieldKey`.
//!
//! Resolution walks from the selection's common ancestor (or the clicked node) up to
//! the nearest `Field` element whose marker parses. Unresolvable input yields `None`
//! and downstream components simply stay inactive.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::field_key::FieldKey;
use crate::preview::render::{ATTR_FIELD, ATTR_INDEX, ATTR_SECTION, ATTR_SUB_INDEX};
use crate::preview::tree::{NodeId, NodeRef, PreviewTree, Tag};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// A boundary point of a host selection. `offset` counts chars into the node's text
/// content (for text nodes, into the node itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

/// The host's raw selection, in anchor/focus order (either may come first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSelection {
    pub anchor: Position,
    pub focus: Position,
}

/// A selection resolved to one field, with char offsets into the field's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSelection {
    pub field_key: FieldKey,
    pub start_index: usize,
    pub end_index: usize,
    pub text: String,
    /// Field element the selection was resolved against.
    #[serde(skip)]
    pub marker: Option<NodeRef>,
}

#[derive(Debug, Error, PartialEq)]
pub enum MarkerError {
    #[error("field marker missing '{0}'")]
    MissingAttribute(&'static str),

    #[error("field marker attribute '{attr}' has non-numeric value '{value}'")]
    BadIndex { attr: &'static str, value: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Markers
// ────────────────────────────────────────────────────────────────────────────

/// Parses the field marker carried by `node`.
///
/// `Ok(None)` means the node is not a field element at all.
pub fn parse_marker(tree: &PreviewTree, node: NodeId) -> Result<Option<FieldKey>, MarkerError> {
    let Some(el) = tree.element(node) else {
        return Ok(None);
    };
    if el.tag != Tag::Field && !el.attrs.contains_key(ATTR_FIELD) {
        return Ok(None);
    }
    let section = tree
        .attr(node, ATTR_SECTION)
        .ok_or(MarkerError::MissingAttribute(ATTR_SECTION))?;
    let field = tree
        .attr(node, ATTR_FIELD)
        .ok_or(MarkerError::MissingAttribute(ATTR_FIELD))?;
    Ok(Some(FieldKey {
        section: section.to_string(),
        field: field.to_string(),
        index: parse_index(tree, node, ATTR_INDEX)?,
        sub_index: parse_index(tree, node, ATTR_SUB_INDEX)?,
    }))
}

fn parse_index(
    tree: &PreviewTree,
    node: NodeId,
    attr: &'static str,
) -> Result<Option<usize>, MarkerError> {
    tree.attr(node, attr)
        .map(|value| {
            value.parse().map_err(|_| MarkerError::BadIndex {
                attr,
                value: value.to_string(),
            })
        })
        .transpose()
}

/// Nearest ancestor-or-self carrying a valid field marker.
fn enclosing_field(tree: &PreviewTree, node: NodeId) -> Option<(NodeId, FieldKey)> {
    tree.ancestors(node).into_iter().find_map(|n| match parse_marker(tree, n) {
        Ok(Some(key)) => Some((n, key)),
        Ok(None) => None,
        Err(err) => {
            debug!(node = n.0, error = %err, "Skipping malformed field marker");
            None
        }
    })
}

/// Every field element of the tree in document order, including malformed ones.
pub fn field_nodes(tree: &PreviewTree) -> Vec<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .filter(|n| tree.tag(*n) == Some(Tag::Field))
        .collect()
}

/// Finds the rendered field element for `key`.
pub fn find_field(tree: &PreviewTree, key: &FieldKey) -> Option<NodeId> {
    field_nodes(tree)
        .into_iter()
        .find(|n| matches!(parse_marker(tree, *n), Ok(Some(ref k)) if k == key))
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

/// Resolves a host selection to a `TextSelection`, or `None` when the selection is
/// empty, whitespace-only, detached, or outside every field.
pub fn resolve_selection(tree: &PreviewTree, selection: &NativeSelection) -> Option<TextSelection> {
    let (anchor, focus) = (selection.anchor, selection.focus);
    if !tree.is_attached(anchor.node) || !tree.is_attached(focus.node) {
        return None;
    }
    let (start, end) = match tree.compare_order(anchor.node, focus.node) {
        std::cmp::Ordering::Greater => (focus, anchor),
        std::cmp::Ordering::Equal if focus.offset < anchor.offset => (focus, anchor),
        _ => (anchor, focus),
    };

    let common = tree.common_ancestor(start.node, end.node)?;
    let (field, key) = enclosing_field(tree, common)?;

    let text: Vec<char> = tree.text_content(field).chars().collect();
    let start_index = offset_in_field(tree, field, start).min(text.len());
    let end_index = offset_in_field(tree, field, end).min(text.len());
    if start_index >= end_index {
        return None;
    }
    let selected: String = text[start_index..end_index].iter().collect();
    if selected.trim().is_empty() {
        return None;
    }

    Some(TextSelection {
        field_key: key,
        start_index,
        end_index,
        text: selected,
        marker: Some(tree.node_ref(field)),
    })
}

/// Char offset of `pos` within the text content of `field`.
fn offset_in_field(tree: &PreviewTree, field: NodeId, pos: Position) -> usize {
    let mut offset = 0;
    for node in tree.descendants(field) {
        if node == pos.node {
            return offset + pos.offset;
        }
        if let Some(text) = tree.text(node) {
            offset += text.chars().count();
        }
    }
    // Position lies outside the field.
    offset
}

/// Resolves a clicked node to the field it belongs to.
pub fn resolve_click_target(tree: &PreviewTree, node: NodeId) -> Option<FieldKey> {
    if !tree.is_attached(node) {
        return None;
    }
    enclosing_field(tree, node).map(|(_, key)| key)
}

/// Resolves a clicked node outside any field to its `(section, entry index)`.
pub fn resolve_section_target(tree: &PreviewTree, node: NodeId) -> Option<(String, Option<usize>)> {
    if !tree.is_attached(node) {
        return None;
    }
    tree.ancestors(node).into_iter().find_map(|n| {
        let section = tree.attr(n, ATTR_SECTION)?;
        let index = tree.attr(n, ATTR_INDEX).and_then(|v| v.parse().ok());
        Some((section.to_string(), index))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Word boundaries
// ────────────────────────────────────────────────────────────────────────────

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\'' || c == '’'
}

/// Extends `selection` backward to the start of the word containing its first char
/// and forward to the end of the word containing its last char, scanning the field's
/// stored text. Selections already on word boundaries are unchanged.
pub fn expand_to_word_boundaries(selection: &TextSelection, field_text: &str) -> TextSelection {
    let chars: Vec<char> = field_text.chars().collect();
    let mut start = selection.start_index.min(chars.len());
    let mut end = selection.end_index.min(chars.len()).max(start);

    while start > 0 && is_word_char(chars[start - 1]) && start < chars.len() && is_word_char(chars[start]) {
        start -= 1;
    }
    while end < chars.len() && end > 0 && is_word_char(chars[end - 1]) && is_word_char(chars[end]) {
        end += 1;
    }

    TextSelection {
        field_key: selection.field_key.clone(),
        start_index: start,
        end_index: end,
        text: chars[start..end].iter().collect(),
        marker: selection.marker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ResumeDocument;
    use crate::models::resume::WORK_EXPERIENCES;
    use crate::preview::render::render;

    fn first_text(tree: &PreviewTree, field: NodeId) -> NodeId {
        tree.descendants(field)
            .into_iter()
            .find(|n| tree.text(*n).is_some())
            .unwrap()
    }

    fn select(tree: &PreviewTree, key: &FieldKey, needle: &str) -> NativeSelection {
        let field = find_field(tree, key).unwrap();
        let text_node = first_text(tree, field);
        let text = tree.text(text_node).unwrap();
        let byte = text.find(needle).unwrap();
        let start = text[..byte].chars().count();
        NativeSelection {
            anchor: Position { node: text_node, offset: start },
            focus: Position {
                node: text_node,
                offset: start + needle.chars().count(),
            },
        }
    }

    #[test]
    fn test_five_years_resolves_to_flattened_bullet_key() {
        let tree = render(&ResumeDocument::default());
        let key = FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 2);
        let sel = resolve_selection(&tree, &select(&tree, &key, "five years")).unwrap();
        assert_eq!(
            sel.field_key,
            FieldKey {
                section: "work_experiences".into(),
                field: "bullet".into(),
                index: Some(0),
                sub_index: Some(2),
            }
        );
        assert_eq!(sel.text, "five years");
    }

    #[test]
    fn test_every_field_resolves_to_its_own_key() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        for key in doc.content.field_keys() {
            let field = find_field(&tree, &key).unwrap_or_else(|| panic!("{key} not rendered"));
            let node = first_text(&tree, field);
            let len = tree.text(node).unwrap().chars().count();
            let native = NativeSelection {
                anchor: Position { node, offset: 0 },
                focus: Position { node, offset: len },
            };
            let sel = resolve_selection(&tree, &native).unwrap();
            assert_eq!(sel.field_key, key);
        }
    }

    #[test]
    fn test_backward_selection_is_normalized() {
        let tree = render(&ResumeDocument::default());
        let key = FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 2);
        let forward = select(&tree, &key, "junior");
        let backward = NativeSelection {
            anchor: forward.focus,
            focus: forward.anchor,
        };
        assert_eq!(resolve_selection(&tree, &backward).unwrap().text, "junior");
    }

    #[test]
    fn test_empty_and_whitespace_selections_rejected() {
        let tree = render(&ResumeDocument::default());
        let key = FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 2);
        let mut collapsed = select(&tree, &key, "five");
        collapsed.focus = collapsed.anchor;
        assert!(resolve_selection(&tree, &collapsed).is_none());
        assert!(resolve_selection(&tree, &select(&tree, &key, " ")).is_none());
    }

    #[test]
    fn test_selection_outside_fields_resolves_to_none() {
        let tree = render(&ResumeDocument::default());
        let heading_text = tree
            .descendants(tree.root())
            .into_iter()
            .find(|n| tree.text(*n) == Some("Experience"))
            .unwrap();
        let native = NativeSelection {
            anchor: Position { node: heading_text, offset: 0 },
            focus: Position { node: heading_text, offset: 4 },
        };
        assert!(resolve_selection(&tree, &native).is_none());
        assert!(resolve_click_target(&tree, heading_text).is_none());
        assert_eq!(
            resolve_section_target(&tree, heading_text),
            Some((WORK_EXPERIENCES.to_string(), None))
        );
    }

    #[test]
    fn test_selection_across_sibling_fields_has_no_enclosing_marker() {
        let tree = render(&ResumeDocument::default());
        let title = find_field(&tree, &FieldKey::entry(WORK_EXPERIENCES, "job_title", 0)).unwrap();
        let company = find_field(&tree, &FieldKey::entry(WORK_EXPERIENCES, "company", 0)).unwrap();
        let native = NativeSelection {
            anchor: Position { node: first_text(&tree, title), offset: 0 },
            focus: Position { node: first_text(&tree, company), offset: 2 },
        };
        assert!(resolve_selection(&tree, &native).is_none());
    }

    #[test]
    fn test_click_target_resolves_through_text_node() {
        let tree = render(&ResumeDocument::default());
        let key = FieldKey::entry(WORK_EXPERIENCES, "company", 0);
        let field = find_field(&tree, &key).unwrap();
        assert_eq!(resolve_click_target(&tree, first_text(&tree, field)), Some(key));
    }

    #[test]
    fn test_malformed_marker_is_reported() {
        let mut tree = PreviewTree::new();
        let field = tree.create_element(Tag::Field);
        tree.set_attr(field, ATTR_SECTION, "skills");
        tree.set_attr(field, ATTR_FIELD, "item");
        tree.set_attr(field, ATTR_INDEX, "first");
        tree.append_child(tree.root(), field);
        assert!(matches!(
            parse_marker(&tree, field),
            Err(MarkerError::BadIndex { attr: "data-index", .. })
        ));
        assert!(resolve_click_target(&tree, field).is_none());
    }

    #[test]
    fn test_expand_to_word_boundaries_snaps_both_ends() {
        let text = "Mentored junior developers";
        let sel = TextSelection {
            field_key: FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 2),
            start_index: 11,
            end_index: 19,
            text: text[11..19].to_string(),
            marker: None,
        };
        let expanded = expand_to_word_boundaries(&sel, text);
        assert_eq!(expanded.text, "junior developers");
        assert_eq!((expanded.start_index, expanded.end_index), (9, 26));

        let whole = expand_to_word_boundaries(&expanded, text);
        assert_eq!(whole, expanded);
    }
}
