//! Formatting Applicator: executes format/clear actions for a resolved selection.
//!
//! Each action has two effects: the overlay entry for the selection's field is updated
//! (field-wide), and the selected char range of the live preview is wrapped in an
//! inline mark for immediate feedback. The next render replaces the marks with the
//! field-wide style. A stale range skips the visual half only.

use serde::Serialize;
use tracing::{debug, warn};

use crate::format::attributes::{AttributeValue, FormatAttribute, FormatAttributes, FormatCommand};
use crate::models::document::ResumeDocument;
use crate::models::resume::FieldError;
use crate::preview::resolver::TextSelection;
use crate::preview::tree::{NodeId, PreviewTree, Tag};

pub const ATTR_STYLE: &str = "style";
pub const ATTR_FORMAT: &str = "data-format";

/// What the toolbar should do after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dismissal {
    /// Hide after the dismiss delay unless interaction-locked.
    AfterDelay,
    KeepOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisualEffect {
    /// Marks inserted around the selected range.
    Wrapped { marks: usize },
    /// Marks removed from the selected range.
    Cleared { marks: usize },
    /// The range no longer backs live text; only the overlay changed.
    Skipped { reason: StaleRange },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleRange {
    Detached,
    Collapsed,
    TextChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub value: AttributeValue,
    pub visual: VisualEffect,
    pub dismissal: Dismissal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub cleared: Vec<FormatAttribute>,
    pub visual: VisualEffect,
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// Persists `command` for the selection's field and marks the selected range.
///
/// Boolean commands toggle against the field's current effective value and request
/// delayed dismissal; enumerated commands set the chosen value and keep the toolbar
/// open.
pub fn apply(
    doc: &mut ResumeDocument,
    tree: &mut PreviewTree,
    selection: &TextSelection,
    command: FormatCommand,
) -> Result<ApplyOutcome, FieldError> {
    let key = &selection.field_key;
    doc.content.field_text(key)?;

    let effective = doc.effective_format(key);
    let value = command.resolve(&effective);
    doc.overlay.set(key, value);
    debug!(field = %key, attribute = ?value.attribute(), "Format applied");

    let visual = match live_field(tree, selection) {
        Ok(field) => {
            let marks = wrap_range(tree, field, selection.start_index, selection.end_index, value);
            VisualEffect::Wrapped { marks }
        }
        Err(reason) => {
            warn!(field = %key, ?reason, "Selection range is stale, overlay updated only");
            VisualEffect::Skipped { reason }
        }
    };

    let dismissal = if command.is_toggle() {
        Dismissal::AfterDelay
    } else {
        Dismissal::KeepOpen
    };
    Ok(ApplyOutcome {
        value,
        visual,
        dismissal,
    })
}

/// Clears every overlay attribute of the selection's field and unwraps the marks that
/// overlap the selected range.
pub fn clear(
    doc: &mut ResumeDocument,
    tree: &mut PreviewTree,
    selection: &TextSelection,
) -> Result<ClearOutcome, FieldError> {
    let key = &selection.field_key;
    doc.content.field_text(key)?;

    let cleared = doc
        .overlay
        .clear_field(key)
        .map(|attrs| set_attributes(&attrs))
        .unwrap_or_default();
    debug!(field = %key, cleared = cleared.len(), "Format cleared");

    let visual = match live_field(tree, selection) {
        Ok(field) => VisualEffect::Cleared {
            marks: unwrap_range(tree, field, selection.start_index, selection.end_index),
        },
        Err(reason) => VisualEffect::Skipped { reason },
    };
    Ok(ClearOutcome { cleared, visual })
}

fn set_attributes(attrs: &FormatAttributes) -> Vec<FormatAttribute> {
    let mut out = Vec::new();
    if attrs.bold.is_some() {
        out.push(FormatAttribute::Bold);
    }
    if attrs.italic.is_some() {
        out.push(FormatAttribute::Italic);
    }
    if attrs.underline.is_some() {
        out.push(FormatAttribute::Underline);
    }
    if attrs.font_family.is_some() {
        out.push(FormatAttribute::FontFamily);
    }
    if attrs.font_size.is_some() {
        out.push(FormatAttribute::FontSize);
    }
    if attrs.alignment.is_some() {
        out.push(FormatAttribute::Alignment);
    }
    if attrs.letter_spacing.is_some() {
        out.push(FormatAttribute::LetterSpacing);
    }
    if attrs.line_height.is_some() {
        out.push(FormatAttribute::LineHeight);
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Range handling
// ────────────────────────────────────────────────────────────────────────────

/// Checks that the range still backs live text: the field element is attached to
/// this tree and its text at the range is what was selected.
fn live_field(tree: &PreviewTree, selection: &TextSelection) -> Result<NodeId, StaleRange> {
    if selection.start_index >= selection.end_index {
        return Err(StaleRange::Collapsed);
    }
    let field = selection
        .marker
        .and_then(|handle| tree.resolve(handle))
        .ok_or(StaleRange::Detached)?;
    let current: String = tree
        .text_content(field)
        .chars()
        .skip(selection.start_index)
        .take(selection.end_index - selection.start_index)
        .collect();
    if current != selection.text {
        return Err(StaleRange::TextChanged);
    }
    Ok(field)
}

/// Text nodes under `field` with their starting char offset.
fn text_runs(tree: &PreviewTree, field: NodeId) -> Vec<(NodeId, usize, usize)> {
    let mut offset = 0;
    let mut runs = Vec::new();
    for node in tree.descendants(field) {
        if let Some(text) = tree.text(node) {
            let len = text.chars().count();
            runs.push((node, offset, len));
            offset += len;
        }
    }
    runs
}

fn mark_tag(value: &AttributeValue) -> Tag {
    match value {
        AttributeValue::Bold(true) => Tag::Strong,
        AttributeValue::Italic(true) => Tag::Emphasis,
        AttributeValue::Underline(true) => Tag::Underline,
        _ => Tag::Span,
    }
}

/// Wraps the chars `[start, end)` of `field` in marks for `value`. One mark is created
/// per text run the range touches. Returns the number of marks created.
fn wrap_range(
    tree: &mut PreviewTree,
    field: NodeId,
    start: usize,
    end: usize,
    value: AttributeValue,
) -> usize {
    let tag = mark_tag(&value);
    let mut marks = 0;
    for (node, run_start, len) in text_runs(tree, field) {
        let run_end = run_start + len;
        if run_end <= start || run_start >= end {
            continue;
        }
        let mut target = node;
        if start > run_start {
            match tree.split_text(target, start - run_start) {
                Some(right) => target = right,
                None => continue,
            }
        }
        let local_end = end.min(run_end) - start.max(run_start);
        tree.split_text(target, local_end);

        if let Some(mark) = tree.wrap(target, tag) {
            tree.set_attr(mark, ATTR_FORMAT, value.attribute().as_str());
            if tag == Tag::Span {
                tree.set_attr(mark, ATTR_STYLE, value.css());
            }
            marks += 1;
        }
    }
    marks
}

/// Unwraps inline marks under `field` whose text overlaps `[start, end)`.
fn unwrap_range(tree: &mut PreviewTree, field: NodeId, start: usize, end: usize) -> usize {
    let runs = text_runs(tree, field);
    let overlapping: Vec<NodeId> = tree
        .descendants(field)
        .into_iter()
        .filter(|n| tree.tag(*n).is_some_and(Tag::is_inline_mark))
        .filter(|mark| {
            runs.iter().any(|(node, run_start, len)| {
                *run_start < end
                    && run_start + len > start
                    && tree.ancestors(*node).contains(mark)
            })
        })
        .collect();
    for mark in &overlapping {
        tree.unwrap(*mark);
    }
    overlapping.len()
}
