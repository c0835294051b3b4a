//! Off-tree measurement of rendered blocks.
//!
//! `MetricSurface` copies each block's subtree into its own arena before measuring, so
//! measuring never touches (and is never observed as a mutation of) the live preview.
//! Heights come from greedy word wrap over the static font tables at the full
//! content width.

use thiserror::Error;

use crate::format::attributes::{FontSize, ResolvedStyle};
use crate::layout::font_metrics::{get_metrics, PageConfig};
use crate::preview::tree::{NodeId, PreviewTree, Tag};

#[derive(Debug, Error, PartialEq)]
pub enum MeasureError {
    #[error("measurement surface unavailable")]
    Unavailable,

    #[error("block {0:?} is not part of the measured tree")]
    BlockMissing(NodeId),
}

/// Anything that can report the rendered height of a block, in points.
pub trait MeasurementSurface: Send {
    fn measure(&mut self, tree: &PreviewTree, block: NodeId) -> Result<f32, MeasureError>;

    /// The page frame changed; later measurements wrap at its content width.
    fn set_page(&mut self, page: PageConfig);
}

// ────────────────────────────────────────────────────────────────────────────
// Box model constants (points)
// ────────────────────────────────────────────────────────────────────────────

const SECTION_GAP_PT: f32 = 10.0;
const ENTRY_GAP_PT: f32 = 6.0;
const HEADING_GAP_PT: f32 = 4.0;
const LIST_INDENT_PT: f32 = 12.0;

fn trailing_gap(tag: Tag) -> f32 {
    match tag {
        Tag::Section => SECTION_GAP_PT,
        Tag::Entry => ENTRY_GAP_PT,
        Tag::Heading => HEADING_GAP_PT,
        _ => 0.0,
    }
}

/// One word with the style it is set in.
struct Word {
    text: String,
    style: ResolvedStyle,
}

// ────────────────────────────────────────────────────────────────────────────
// Metric surface
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MetricSurface {
    page: PageConfig,
    available: bool,
}

impl MetricSurface {
    pub fn new(page: PageConfig) -> Self {
        Self {
            page,
            available: true,
        }
    }

    /// Simulates the surface being torn down (or not yet mounted).
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn subtree_height(&self, tree: &PreviewTree, node: NodeId) -> f32 {
        let Some(tag) = tree.tag(node) else {
            return 0.0;
        };
        let body = if tag.is_line_box() {
            let indent = if tag == Tag::ListItem { LIST_INDENT_PT } else { 0.0 };
            let base = heading_style(tag);
            let words = collect_words(tree, node, base, false);
            wrapped_height(&words, self.page.content_width_pt() - indent)
        } else {
            tree.children(node)
                .iter()
                .map(|child| self.subtree_height(tree, *child))
                .sum()
        };
        body + trailing_gap(tag)
    }
}

impl MeasurementSurface for MetricSurface {
    fn measure(&mut self, tree: &PreviewTree, block: NodeId) -> Result<f32, MeasureError> {
        if !self.available {
            return Err(MeasureError::Unavailable);
        }
        if !tree.is_attached(block) {
            return Err(MeasureError::BlockMissing(block));
        }
        let copy = tree.clone_subtree(block);
        Ok(self.subtree_height(&copy, copy.root()))
    }

    fn set_page(&mut self, page: PageConfig) {
        self.page = page;
    }
}

/// Text outside any field: headings are bold and one size up.
fn heading_style(tag: Tag) -> ResolvedStyle {
    let mut style = ResolvedStyle::default();
    if tag == Tag::Heading {
        style.bold = true;
        style.font_size = FontSize::Lg;
    }
    style
}

fn collect_words(tree: &PreviewTree, node: NodeId, inherited: ResolvedStyle, in_field: bool) -> Vec<Word> {
    if let Some(text) = tree.text(node) {
        return text
            .split_whitespace()
            .map(|w| Word {
                text: w.to_string(),
                style: inherited,
            })
            .collect();
    }
    let Some(el) = tree.element(node) else {
        return Vec::new();
    };
    let mut style = match (el.tag, el.style) {
        (Tag::Field, Some(field_style)) if !in_field => field_style,
        _ => inherited,
    };
    match el.tag {
        Tag::Strong => style.bold = true,
        Tag::Emphasis => style.italic = true,
        _ => {}
    }
    let in_field = in_field || el.tag == Tag::Field;
    tree.children(node)
        .iter()
        .flat_map(|child| collect_words(tree, *child, style, in_field))
        .collect()
}

fn word_width(text: &str, style: &ResolvedStyle) -> f32 {
    get_metrics(style.font_family).measure_pt(
        text,
        style.font_size.points(),
        style.bold,
        style.letter_spacing.em(),
    )
}

fn line_box_height(style: &ResolvedStyle) -> f32 {
    style.font_size.points() * style.line_height.factor()
}

/// Greedy word wrap. A word wider than the line sits alone on its own line.
fn wrapped_height(words: &[Word], available: f32) -> f32 {
    let mut total = 0.0;
    let mut line_width = 0.0;
    let mut line_height: f32 = 0.0;
    let mut line_empty = true;

    for word in words {
        let width = word_width(&word.text, &word.style);
        let space = word_width(" ", &word.style);
        if !line_empty && line_width + space + width > available {
            total += line_height;
            line_width = 0.0;
            line_height = 0.0;
            line_empty = true;
        }
        if !line_empty {
            line_width += space;
        }
        line_width += width;
        line_height = line_height.max(line_box_height(&word.style));
        line_empty = false;
    }
    if !line_empty {
        total += line_height;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::attributes::{AttributeValue, LineHeight};
    use crate::models::document::ResumeDocument;
    use crate::models::field_key::FieldKey;
    use crate::models::resume::WORK_EXPERIENCES;
    use crate::preview::render::render;

    fn sections(tree: &PreviewTree) -> Vec<NodeId> {
        tree.children(tree.root()).to_vec()
    }

    fn line_with(text: &str) -> (PreviewTree, NodeId) {
        let mut tree = PreviewTree::new();
        let line = tree.create_element(Tag::Line);
        tree.append_child(tree.root(), line);
        let t = tree.create_text(text);
        tree.append_child(line, t);
        (tree, line)
    }

    #[test]
    fn test_single_short_line_is_one_line_box() {
        let (tree, line) = line_with("Hello world");
        let mut surface = MetricSurface::new(PageConfig::default());
        let height = surface.measure(&tree, line).unwrap();
        assert!((height - 11.0 * 1.3).abs() < 1e-3);
    }

    #[test]
    fn test_long_text_wraps_onto_more_lines() {
        let long = "word ".repeat(200);
        let (tree, line) = line_with(&long);
        let mut surface = MetricSurface::new(PageConfig::default());
        let height = surface.measure(&tree, line).unwrap();
        assert!(height > 11.0 * 1.3 * 5.0);
    }

    #[test]
    fn test_line_height_format_grows_block() {
        let mut doc = ResumeDocument::default();
        let mut surface = MetricSurface::new(PageConfig::default());
        let before = {
            let tree = render(&doc);
            surface.measure(&tree, sections(&tree)[1]).unwrap()
        };
        for sub in 0..3 {
            doc.overlay.set(
                &FieldKey::element(WORK_EXPERIENCES, "bullet", 0, sub),
                AttributeValue::LineHeight(LineHeight::Loose),
            );
        }
        let tree = render(&doc);
        let after = surface.measure(&tree, sections(&tree)[1]).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_measuring_does_not_mutate_live_tree() {
        let tree = render(&ResumeDocument::default());
        let before = tree.mutation_count();
        let mut surface = MetricSurface::new(PageConfig::default());
        for block in sections(&tree) {
            surface.measure(&tree, block).unwrap();
        }
        assert_eq!(tree.mutation_count(), before);
    }

    #[test]
    fn test_unavailable_surface_errors() {
        let (tree, line) = line_with("x");
        let mut surface = MetricSurface::new(PageConfig::default());
        surface.set_available(false);
        assert_eq!(surface.measure(&tree, line), Err(MeasureError::Unavailable));
    }

    #[test]
    fn test_detached_block_is_missing() {
        let (mut tree, line) = line_with("x");
        tree.detach(line);
        let mut surface = MetricSurface::new(PageConfig::default());
        assert_eq!(surface.measure(&tree, line), Err(MeasureError::BlockMissing(line)));
    }
}
