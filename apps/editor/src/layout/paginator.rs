//! Paginator: packs measured blocks into fixed-height page frames.
//!
//! `paginate` is pure over heights. `Paginator` wraps it with block collection,
//! measurement, recompute triggers and retention of the last good result.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::layout::font_metrics::PageConfig;
use crate::layout::measure::{MeasureError, MeasurementSurface};
use crate::preview::events::{EventBus, Mutation, Resize, Subscriber, Subscription, Target};
use crate::preview::render::ATTR_ID;
use crate::preview::tree::{NodeId, PreviewTree};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Which nodes count as one unbreakable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Each rendered section moves as a whole.
    Section,
    /// Each direct child of every section (heading, entry, line) moves on its own.
    ChildElement,
}

/// Reference to one content block, stable for a given render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    /// `section-<name>` or `section-<name>/<child position>`.
    pub id: String,
    #[serde(skip)]
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuredBlock {
    pub block: BlockRef,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub blocks: Vec<MeasuredBlock>,
    pub height: f32,
}

impl Page {
    fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            height: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub budget: f32,
    pub granularity: Granularity,
    pub pages: Vec<Page>,
}

impl PaginationResult {
    /// All blocks, page by page, in order.
    pub fn blocks(&self) -> impl Iterator<Item = &MeasuredBlock> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationTrigger {
    ContentChange,
    FormatChange,
    Resize,
    Mutation,
}

// ────────────────────────────────────────────────────────────────────────────
// Packing
// ────────────────────────────────────────────────────────────────────────────

/// Greedy first-fit in order: a block that would overflow the current non-empty
/// page closes it and starts the next one. A block taller than `budget` ends up alone
/// on its page.
pub fn paginate(blocks: Vec<MeasuredBlock>, budget: f32, granularity: Granularity) -> PaginationResult {
    let mut pages = Vec::new();
    let mut current = Page::empty();
    for block in blocks {
        if !current.blocks.is_empty() && current.height + block.height > budget {
            pages.push(std::mem::replace(&mut current, Page::empty()));
        }
        current.height += block.height;
        current.blocks.push(block);
    }
    if !current.blocks.is_empty() {
        pages.push(current);
    }
    PaginationResult {
        budget,
        granularity,
        pages,
    }
}

/// Content blocks of `tree` in document order at `granularity`.
pub fn collect_blocks(tree: &PreviewTree, granularity: Granularity) -> Vec<BlockRef> {
    let mut out = Vec::new();
    for &section in tree.children(tree.root()) {
        let anchor = tree.attr(section, ATTR_ID).unwrap_or("section").to_string();
        match granularity {
            Granularity::Section => out.push(BlockRef {
                id: anchor,
                node: section,
            }),
            Granularity::ChildElement => {
                out.extend(tree.children(section).iter().enumerate().map(|(i, &child)| BlockRef {
                    id: format!("{anchor}/{i}"),
                    node: child,
                }));
            }
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Paginator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct PaginatorListeners {
    mutation: Subscription<Mutation>,
    resize: Subscription<Resize>,
}

pub struct Paginator {
    surface: Box<dyn MeasurementSurface>,
    granularity: Granularity,
    page: PageConfig,
    last: Option<PaginationResult>,
    pending: Vec<PaginationTrigger>,
    listeners: Option<PaginatorListeners>,
}

impl Paginator {
    pub fn new(mut surface: Box<dyn MeasurementSurface>, granularity: Granularity, page: PageConfig) -> Self {
        surface.set_page(page);
        Self {
            surface,
            granularity,
            page,
            last: None,
            pending: Vec::new(),
            listeners: None,
        }
    }

    pub fn result(&self) -> Option<&PaginationResult> {
        self.last.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn mark_dirty(&mut self, trigger: PaginationTrigger) {
        if !self.pending.contains(&trigger) {
            self.pending.push(trigger);
        }
    }

    /// Viewport resizes change the page frame: both the budget and the width the
    /// surface wraps text at.
    pub fn resize(&mut self, page: PageConfig) {
        if page != self.page {
            self.page = page;
            self.surface.set_page(page);
            self.mark_dirty(PaginationTrigger::Resize);
        }
    }

    /// Subscribes to document-level mutation and resize events. Idempotent.
    pub fn attach(&mut self, bus: &mut EventBus) {
        if self.listeners.is_none() {
            self.listeners = Some(PaginatorListeners {
                mutation: bus.subscribe(Target::Document, Subscriber::Paginator),
                resize: bus.subscribe(Target::Document, Subscriber::Paginator),
            });
        }
    }

    pub fn detach(&mut self, bus: &mut EventBus) {
        if let Some(listeners) = self.listeners.take() {
            bus.unsubscribe(listeners.mutation);
            bus.unsubscribe(listeners.resize);
        }
    }

    /// Measures every block of `tree` and replaces the last result.
    ///
    /// `tree` is only read; measurement happens on off-tree copies. On failure the
    /// previous result stays in place and the triggers remain pending.
    pub fn recompute(&mut self, tree: &PreviewTree) -> Result<&PaginationResult, MeasureError> {
        let blocks = collect_blocks(tree, self.granularity);
        let mut measured = Vec::with_capacity(blocks.len());
        for block in blocks {
            match self.surface.measure(tree, block.node) {
                Ok(height) => measured.push(MeasuredBlock { block, height }),
                Err(err) => {
                    warn!(error = %err, "Pagination skipped, keeping previous result");
                    return Err(err);
                }
            }
        }

        let result = paginate(measured, self.page.content_height_pt(), self.granularity);
        debug!(
            pages = result.pages.len(),
            triggers = ?self.pending,
            "Pagination recomputed"
        );
        self.pending.clear();
        Ok(self.last.insert(result))
    }
}
