//! One editing session: the document, its live preview, and the components that
//! react to user input on that preview.
//!
//! Everything here is synchronous and single-writer. Time is passed in as `now`;
//! the registry arms a tokio task for `next_deadline()` that calls `tick`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::format::applicator::{self, ApplyOutcome, ClearOutcome, Dismissal, VisualEffect};
use crate::format::attributes::FormatCommand;
use crate::layout::{
    Granularity, MeasurementSurface, MetricSurface, PageConfig, PaginationResult, PaginationTrigger, Paginator,
};
use crate::models::document::ResumeDocument;
use crate::models::field_key::FieldKey;
use crate::models::resume::{validate_key, FieldError, WORK_EXPERIENCES};
use crate::preview::events::{EventBus, EventKind, Subscriber};
use crate::preview::render::render;
use crate::preview::resolver::{expand_to_word_boundaries, resolve_selection, NativeSelection};
use crate::preview::sync_bridge::{ClickOutcome, FormCommand, FormRegistry, SyncBridge};
use crate::preview::toolbar::{
    KeyOutcome, KeyPress, Point, Popover, Rect, Surface, ToolbarConfig, ToolbarController, ToolbarView,
    Viewport,
};
use crate::preview::tree::{NodeId, PreviewTree};
use crate::session::callbacks::EditorCallbacks;
use crate::session::debounce::Debouncer;

#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub edit_debounce: Duration,
    pub highlight: Duration,
    pub toolbar: ToolbarConfig,
    pub granularity: Granularity,
    pub page: PageConfig,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            edit_debounce: Duration::from_millis(100),
            highlight: Duration::from_millis(1500),
            toolbar: ToolbarConfig::default(),
            granularity: Granularity::Section,
            page: PageConfig::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Structural edits apply immediately; `SetField` goes through the debouncer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    #[serde(rename_all = "camelCase")]
    SetField { field_key: FieldKey, value: String },
    AddEntry { section: String },
    RemoveEntry { section: String, index: usize },
    MoveEntry { section: String, from: usize, to: usize },
    AddElement {
        section: String,
        field: String,
        index: usize,
        #[serde(default)]
        project: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveElement { field_key: FieldKey },
    AddProject { experience: usize },
    RemoveProject { experience: usize, project: usize },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ToolbarInput {
    PointerDown { point: Point },
    PointerEnter { surface: Surface },
    PointerLeave { surface: Surface },
    PopoverOpen { popover: Popover },
    PopoverClose { popover: Popover },
    Key { key: KeyPress },
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReceipt {
    /// Key created or debounced by the edit, if any.
    pub field_key: Option<FieldKey>,
    /// False while the edit waits in the debounce window.
    pub applied: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub edits_flushed: usize,
    pub toolbar_hidden: bool,
    pub highlight_cleared: bool,
    pub repaginated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarResponse {
    pub toolbar: ToolbarView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ApplyOutcome>,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct EditorSession {
    id: Uuid,
    doc: ResumeDocument,
    tree: PreviewTree,
    bus: EventBus,
    toolbar: ToolbarController,
    bridge: SyncBridge,
    paginator: Paginator,
    debouncer: Debouncer,
    /// Set when a trigger arrives; cleared by any recompute attempt, so a failing
    /// surface waits for the next trigger instead of retrying in a loop.
    repaginate_due: bool,
    callbacks: Arc<dyn EditorCallbacks>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EditorSession {
    pub fn new(
        id: Uuid,
        doc: ResumeDocument,
        settings: EditorSettings,
        callbacks: Arc<dyn EditorCallbacks>,
    ) -> Self {
        let surface = Box::new(MetricSurface::new(settings.page));
        Self::with_surface(id, doc, settings, callbacks, surface)
    }

    /// Opens a session whose paginator measures through `surface`.
    pub fn with_surface(
        id: Uuid,
        doc: ResumeDocument,
        settings: EditorSettings,
        callbacks: Arc<dyn EditorCallbacks>,
        surface: Box<dyn MeasurementSurface>,
    ) -> Self {
        let tree = render(&doc);
        let mut bus = EventBus::new();

        let mut toolbar = ToolbarController::new(settings.toolbar.clone());
        toolbar.attach(&mut bus);

        let mut bridge = SyncBridge::new(FormRegistry::from_resume(&doc.content), settings.highlight);
        bridge.reattach(&mut bus, &tree);

        let mut paginator = Paginator::new(surface, settings.granularity, settings.page);
        paginator.attach(&mut bus);

        let now = Utc::now();
        let mut session = Self {
            id,
            doc,
            tree,
            bus,
            toolbar,
            bridge,
            paginator,
            debouncer: Debouncer::new(settings.edit_debounce),
            repaginate_due: false,
            callbacks,
            created_at: now,
            updated_at: now,
        };
        session.invalidate_pages(PaginationTrigger::ContentChange);
        session.repaginate();
        info!(session_id = %id, "Editor session opened");
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> &ResumeDocument {
        &self.doc
    }

    pub fn preview(&self) -> &PreviewTree {
        &self.tree
    }

    pub fn toolbar(&self) -> ToolbarView {
        self.toolbar.view()
    }

    pub fn pagination(&self) -> Option<&PaginationResult> {
        self.paginator.result()
    }

    pub fn pending_edits(&self) -> usize {
        self.debouncer.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Earliest time `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.debouncer.next_deadline(),
            self.toolbar.next_deadline(),
            self.bridge.highlight_deadline(),
            self.repaginate_due.then(Instant::now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ── rendering ───────────────────────────────────────────────────────────

    /// Re-renders the live preview and re-binds node listeners to the new field nodes.
    fn rerender(&mut self) {
        self.tree = render(&self.doc);
        self.bridge.set_registry(FormRegistry::from_resume(&self.doc.content));
        self.bridge.reattach(&mut self.bus, &self.tree);
        self.invalidate_pages(PaginationTrigger::ContentChange);
    }

    fn invalidate_pages(&mut self, trigger: PaginationTrigger) {
        self.paginator.mark_dirty(trigger);
        self.repaginate_due = true;
    }

    /// Recomputes pages from a fresh render of the document, which is what the next
    /// live render will show. The live tree is never measured.
    fn repaginate(&mut self) -> bool {
        self.repaginate_due = false;
        let snapshot = render(&self.doc);
        match self.paginator.recompute(&snapshot) {
            Ok(result) => {
                debug!(session_id = %self.id, pages = result.pages.len(), "Pages updated");
                true
            }
            Err(_) => false,
        }
    }

    fn notify_mutation(&mut self) {
        let root = self.tree.node_ref(self.tree.root());
        let subscribers = self.bus.dispatch(EventKind::Mutation, &self.tree, Some(root));
        if subscribers.contains(&Subscriber::Paginator) {
            self.invalidate_pages(PaginationTrigger::Mutation);
        }
    }

    // ── form → document ─────────────────────────────────────────────────────

    pub fn edit(&mut self, edit: Edit, now: Instant) -> Result<EditReceipt, AppError> {
        if let Edit::SetField { field_key, value } = edit {
            validate_key(&field_key)?;
            self.doc.content.field_text(&field_key)?;
            self.debouncer.push(field_key.clone(), value, now);
            return Ok(EditReceipt {
                field_key: Some(field_key),
                applied: false,
            });
        }

        // Pending values land first so none of them is applied to a shifted key.
        let flushed = self.flush_all();
        let result = self.apply_structural(edit);
        if flushed > 0 || result.is_ok() {
            self.touch();
            self.rerender();
        }
        Ok(EditReceipt {
            field_key: result?,
            applied: true,
        })
    }

    fn apply_structural(&mut self, edit: Edit) -> Result<Option<FieldKey>, FieldError> {
        match edit {
            Edit::SetField { field_key, .. } => Ok(Some(field_key)),
            Edit::AddEntry { section } => {
                let index = self.doc.add_entry(&section)?;
                debug!(section = %section, index, "Entry added");
                Ok(None)
            }
            Edit::RemoveEntry { section, index } => {
                self.doc.remove_entry(&section, index)?;
                debug!(section = %section, index, "Entry removed");
                Ok(None)
            }
            Edit::MoveEntry { section, from, to } => {
                self.doc.move_entry(&section, from, to)?;
                Ok(None)
            }
            Edit::AddElement {
                section,
                field,
                index,
                project,
            } => self.doc.add_element(&section, &field, index, project).map(Some),
            Edit::RemoveElement { field_key } => {
                self.doc.remove_element(&field_key)?;
                Ok(Some(field_key))
            }
            Edit::AddProject { experience } => self
                .doc
                .add_element(WORK_EXPERIENCES, "project_name", experience, None)
                .map(Some),
            Edit::RemoveProject {
                experience,
                project,
            } => {
                self.doc.remove_project(experience, project)?;
                Ok(None)
            }
        }
    }

    fn flush_all(&mut self) -> usize {
        let edits = self.debouncer.take_all();
        self.apply_edits(edits)
    }

    fn apply_edits(&mut self, edits: Vec<(FieldKey, String)>) -> usize {
        let mut applied = 0;
        for (key, value) in edits {
            match self.doc.set_field(&key, value) {
                Ok(()) => applied += 1,
                Err(err) => warn!(field = %key, error = %err, "Dropping debounced edit"),
            }
        }
        applied
    }

    /// Flushes pending edits now, e.g. before saving.
    pub fn flush(&mut self) -> usize {
        let applied = self.flush_all();
        if applied > 0 {
            self.touch();
            self.rerender();
        }
        applied
    }

    // ── preview → toolbar ───────────────────────────────────────────────────

    pub fn select(
        &mut self,
        selection: Option<NativeSelection>,
        rect: Option<Rect>,
        viewport: Viewport,
        expand_to_words: bool,
    ) -> ToolbarView {
        let origin = selection.map(|s| self.tree.node_ref(s.anchor.node));
        let subscribers = self.bus.dispatch(EventKind::SelectionChange, &self.tree, origin);
        if !subscribers.contains(&Subscriber::Toolbar) {
            return self.toolbar.view();
        }

        let resolved = selection
            .and_then(|native| resolve_selection(&self.tree, &native))
            .map(|sel| {
                if !expand_to_words {
                    return sel;
                }
                match self.doc.content.field_text(&sel.field_key) {
                    Ok(text) => expand_to_word_boundaries(&sel, text),
                    Err(_) => sel,
                }
            });
        self.toolbar.on_selection_change(resolved, rect, viewport);
        self.toolbar.view()
    }

    pub fn format(&mut self, command: FormatCommand, now: Instant) -> Result<ApplyOutcome, AppError> {
        let selection = self
            .toolbar
            .selection()
            .cloned()
            .ok_or_else(|| AppError::Conflict("no active selection".to_string()))?;

        let outcome = applicator::apply(&mut self.doc, &mut self.tree, &selection, command)?;
        self.callbacks.on_format_change(&selection, outcome.value);
        self.invalidate_pages(PaginationTrigger::FormatChange);
        if matches!(outcome.visual, VisualEffect::Wrapped { .. }) {
            self.notify_mutation();
        }
        if outcome.dismissal == Dismissal::AfterDelay {
            self.toolbar.request_dismiss(now);
        }
        self.touch();
        Ok(outcome)
    }

    pub fn clear_format(&mut self) -> Result<ClearOutcome, AppError> {
        let selection = self
            .toolbar
            .selection()
            .cloned()
            .ok_or_else(|| AppError::Conflict("no active selection".to_string()))?;

        let outcome = applicator::clear(&mut self.doc, &mut self.tree, &selection)?;
        self.callbacks.on_format_cleared(&selection, &outcome.cleared);
        self.invalidate_pages(PaginationTrigger::FormatChange);
        if matches!(outcome.visual, VisualEffect::Cleared { marks } if marks > 0) {
            self.notify_mutation();
        }
        self.touch();
        Ok(outcome)
    }

    pub fn toolbar_input(&mut self, input: ToolbarInput, now: Instant) -> Result<ToolbarResponse, AppError> {
        let mut key = None;
        let mut format = None;
        let kind = match &input {
            ToolbarInput::Key { .. } => Some(EventKind::KeyDown),
            ToolbarInput::PointerDown { .. } => Some(EventKind::PointerDown),
            _ => None,
        };
        if let Some(kind) = kind {
            if !self.bus.dispatch(kind, &self.tree, None).contains(&Subscriber::Toolbar) {
                return Ok(ToolbarResponse {
                    toolbar: self.toolbar.view(),
                    key: None,
                    format: None,
                });
            }
        }
        match input {
            ToolbarInput::PointerDown { point } => self.toolbar.on_pointer_down(point),
            ToolbarInput::PointerEnter { surface } => self.toolbar.on_pointer_enter(surface),
            ToolbarInput::PointerLeave { surface } => self.toolbar.on_pointer_leave(surface, now),
            ToolbarInput::PopoverOpen { popover } => self.toolbar.on_popover_open(popover),
            ToolbarInput::PopoverClose { popover } => self.toolbar.on_popover_close(popover, now),
            ToolbarInput::Key { key: press } => {
                let outcome = self.toolbar.on_key(&press);
                if let KeyOutcome::Format(command) = outcome {
                    format = Some(self.format(command, now)?);
                }
                key = Some(outcome);
            }
        }
        Ok(ToolbarResponse {
            toolbar: self.toolbar.view(),
            key,
            format,
        })
    }

    // ── preview ↔ form navigation ───────────────────────────────────────────

    pub fn click(&mut self, node: NodeId, now: Instant) -> ClickOutcome {
        let origin = self.tree.node_ref(node);
        let bound = self
            .bus
            .dispatch(EventKind::Click, &self.tree, Some(origin))
            .contains(&Subscriber::SyncBridge);
        // Field navigation needs a bound listener; section clicks do not.
        let outcome = self.bridge.handle_click(&self.tree, node, now, bound);
        self.emit_click(&outcome);
        outcome
    }

    fn emit_click(&self, outcome: &ClickOutcome) {
        match outcome {
            ClickOutcome::Field { field_key, .. } => self.callbacks.on_field_click(field_key),
            ClickOutcome::Section { section, index } => self.callbacks.on_section_click(section, *index),
            ClickOutcome::Nothing => {}
        }
    }

    pub fn jump(&self, section: &str) -> Option<FormCommand> {
        self.bridge.jump_to_section(&self.tree, section)
    }

    pub fn highlighted(&self, now: Instant) -> Option<&str> {
        self.bridge.highlighted(now)
    }

    pub fn resize(&mut self, page: PageConfig) {
        let root = self.tree.node_ref(self.tree.root());
        if self
            .bus
            .dispatch(EventKind::Resize, &self.tree, Some(root))
            .contains(&Subscriber::Paginator)
        {
            self.paginator.resize(page);
            self.repaginate_due |= self.paginator.is_dirty();
        }
    }

    // ── timers ──────────────────────────────────────────────────────────────

    /// Fires every deadline due at `now` and recomputes pages if anything asked for it.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let due = self.debouncer.take_due(now);
        if !due.is_empty() {
            report.edits_flushed = self.apply_edits(due);
            self.touch();
            self.rerender();
        }
        report.toolbar_hidden = self.toolbar.tick(now);
        report.highlight_cleared = self.bridge.tick(now);

        if std::mem::take(&mut self.repaginate_due) && self.paginator.is_dirty() {
            report.repaginated = self.repaginate();
        }
        report
    }

    /// Releases every listener the session registered.
    pub fn close(&mut self) {
        self.toolbar.detach(&mut self.bus);
        self.bridge.detach(&mut self.bus);
        self.paginator.detach(&mut self.bus);
        info!(session_id = %self.id, listeners = self.bus.listener_count(), "Editor session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::format::attributes::{AttributeValue, FontSize, FormatAttribute};
    use crate::layout::MeasureError;
    use crate::models::resume::{EDUCATIONS, PERSONAL_INFO};
    use crate::preview::resolver::{find_field, Position};
    use crate::preview::toolbar::ToolbarState;
    use crate::session::callbacks::{CallbackEvent, Outbox};

    const VIEWPORT: Viewport = Viewport {
        width: 1024.0,
        height: 768.0,
    };

    fn make_session() -> (EditorSession, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::new());
        let session = EditorSession::new(
            Uuid::new_v4(),
            ResumeDocument::default(),
            EditorSettings::default(),
            outbox.clone(),
        );
        (session, outbox)
    }

    fn native_for(session: &EditorSession, key: &FieldKey, needle: &str) -> NativeSelection {
        let tree = session.preview();
        let field = find_field(tree, key).unwrap();
        let node = tree.children(field)[0];
        let text = tree.text(node).unwrap();
        let start = text[..text.find(needle).unwrap()].chars().count();
        NativeSelection {
            anchor: Position { node, offset: start },
            focus: Position {
                node,
                offset: start + needle.chars().count(),
            },
        }
    }

    fn rect() -> Option<Rect> {
        Some(Rect {
            x: 200.0,
            y: 300.0,
            width: 80.0,
            height: 14.0,
        })
    }

    fn bullet() -> FieldKey {
        FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 2)
    }

    /// Metric surface that can be switched off from outside the session.
    struct FlakySurface {
        inner: MetricSurface,
        down: Arc<AtomicBool>,
    }

    impl MeasurementSurface for FlakySurface {
        fn measure(&mut self, tree: &PreviewTree, block: NodeId) -> Result<f32, MeasureError> {
            self.inner.set_available(!self.down.load(Ordering::SeqCst));
            self.inner.measure(tree, block)
        }

        fn set_page(&mut self, page: PageConfig) {
            self.inner.set_page(page);
        }
    }

    fn first_block_height(session: &EditorSession) -> f32 {
        session.pagination().unwrap().blocks().next().unwrap().height
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_paginates_immediately() {
        let (session, _) = make_session();
        let pages = session.pagination().unwrap();
        assert_eq!(pages.blocks().count(), 5);
        assert_eq!(session.toolbar().state, crate::preview::toolbar::ToolbarState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_edit_lands_on_tick() {
        let (mut session, _) = make_session();
        let name = FieldKey::scalar(PERSONAL_INFO, "name");
        let t0 = Instant::now();
        session
            .edit(
                Edit::SetField {
                    field_key: name.clone(),
                    value: "Jordan R.".into(),
                },
                t0,
            )
            .unwrap();
        assert_eq!(session.document().content.personal_info.name, "Jordan Rivera");
        assert_eq!(session.next_deadline(), Some(t0 + Duration::from_millis(100)));

        let report = session.tick(t0 + Duration::from_millis(100));
        assert_eq!(report.edits_flushed, 1);
        assert!(report.repaginated);
        assert_eq!(session.document().content.personal_info.name, "Jordan R.");
        let field = find_field(session.preview(), &name).unwrap();
        assert_eq!(session.preview().text_content(field), "Jordan R.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_to_unknown_field_is_rejected() {
        let (mut session, _) = make_session();
        let err = session
            .edit(
                Edit::SetField {
                    field_key: FieldKey::scalar(PERSONAL_INFO, "nickname"),
                    value: "JR".into(),
                },
                Instant::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Field(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_format_and_dismiss() {
        let (mut session, outbox) = make_session();
        let native = native_for(&session, &bullet(), "five years");
        let view = session.select(Some(native), rect(), VIEWPORT, false);
        assert_eq!(view.selection.unwrap().field_key, bullet());

        let now = Instant::now();
        let outcome = session.format(FormatCommand::Bold, now).unwrap();
        assert_eq!(outcome.value, AttributeValue::Bold(true));
        assert!(matches!(
            outbox.drain()[0],
            CallbackEvent::FormatChange {
                value: AttributeValue::Bold(true),
                ..
            }
        ));

        let report = session.tick(now + Duration::from_millis(150));
        assert!(report.toolbar_hidden);
        assert!(report.repaginated);
        assert!(session.toolbar().selection.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bold_dismisses_while_pointer_is_over_toolbar() {
        let (mut session, _) = make_session();
        let native = native_for(&session, &bullet(), "five years");
        session.select(Some(native), rect(), VIEWPORT, false);
        let now = Instant::now();
        session
            .toolbar_input(
                ToolbarInput::PointerEnter {
                    surface: Surface::Toolbar,
                },
                now,
            )
            .unwrap();
        assert_eq!(session.toolbar().state, ToolbarState::VisibleInteracting);

        session.format(FormatCommand::Bold, now).unwrap();
        assert!(!session.tick(now + Duration::from_millis(100)).toolbar_hidden);
        let report = session.tick(now + Duration::from_millis(150));
        assert!(report.toolbar_hidden);
        assert_eq!(session.toolbar().state, ToolbarState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bold_waits_while_popover_is_open() {
        let (mut session, _) = make_session();
        let native = native_for(&session, &bullet(), "five years");
        session.select(Some(native), rect(), VIEWPORT, false);
        let now = Instant::now();
        session
            .toolbar_input(
                ToolbarInput::PopoverOpen {
                    popover: Popover::FontFamily,
                },
                now,
            )
            .unwrap();
        session.format(FormatCommand::Bold, now).unwrap();
        assert!(!session.tick(now + Duration::from_secs(1)).toolbar_hidden);
        assert!(session.toolbar().state.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_format_notifies_upstream() {
        let (mut session, outbox) = make_session();
        let native = native_for(&session, &bullet(), "junior");
        session.select(Some(native), rect(), VIEWPORT, false);
        let now = Instant::now();
        session.format(FormatCommand::FontSize(FontSize::Lg), now).unwrap();
        outbox.drain();

        let outcome = session.clear_format().unwrap();
        assert_eq!(outcome.cleared, vec![FormatAttribute::FontSize]);
        let events = outbox.drain();
        assert_eq!(events.len(), 1);
        let CallbackEvent::FormatCleared { selection, cleared } = &events[0] else {
            panic!("expected a format_cleared callback, got {events:?}");
        };
        assert_eq!(selection.field_key, bullet());
        assert_eq!(cleared, &vec![FormatAttribute::FontSize]);
        assert_ne!(
            session.document().effective_format(&bullet()).font_size,
            Some(FontSize::Lg)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_remeasures_at_new_width() {
        let mut doc = ResumeDocument::default();
        doc.content.personal_info.summary = "reliable data pipelines and tooling ".repeat(40);
        let outbox = Arc::new(Outbox::new());
        let mut session = EditorSession::new(Uuid::new_v4(), doc, EditorSettings::default(), outbox);
        let wide = first_block_height(&session);

        let now = Instant::now();
        session.resize(PageConfig {
            page_width_pt: 300.0,
            ..PageConfig::default()
        });
        assert!(session.next_deadline().is_some());
        assert!(session.tick(now).repaginated);
        let narrow = first_block_height(&session);
        assert!(narrow > wide, "{narrow} should exceed {wide}");

        // Same frame again is not a trigger.
        session.resize(PageConfig {
            page_width_pt: 300.0,
            ..PageConfig::default()
        });
        assert!(!session.tick(now).repaginated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measurement_failure_keeps_last_pages_until_next_trigger() {
        let down = Arc::new(AtomicBool::new(false));
        let surface = FlakySurface {
            inner: MetricSurface::new(PageConfig::default()),
            down: down.clone(),
        };
        let mut session = EditorSession::with_surface(
            Uuid::new_v4(),
            ResumeDocument::default(),
            EditorSettings::default(),
            Arc::new(Outbox::new()),
            Box::new(surface),
        );
        let before = session.pagination().cloned().unwrap();

        down.store(true, Ordering::SeqCst);
        let t0 = Instant::now();
        session
            .edit(
                Edit::SetField {
                    field_key: FieldKey::scalar(PERSONAL_INFO, "summary"),
                    value: "Ships things. ".repeat(60),
                },
                t0,
            )
            .unwrap();
        let report = session.tick(t0 + Duration::from_millis(100));
        assert_eq!(report.edits_flushed, 1);
        assert!(!report.repaginated);
        assert_eq!(session.pagination(), Some(&before));
        // No retry loop: nothing is due until another trigger arrives.
        assert_eq!(session.next_deadline(), None);

        down.store(false, Ordering::SeqCst);
        session.resize(PageConfig {
            page_width_pt: 500.0,
            ..PageConfig::default()
        });
        assert!(session.tick(t0 + Duration::from_millis(200)).repaginated);
        assert!(first_block_height(&session) > before.blocks().next().unwrap().height);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_on_unbound_field_starts_no_highlight() {
        let (mut session, outbox) = make_session();
        session.bridge.detach(&mut session.bus);
        let key = FieldKey::scalar(PERSONAL_INFO, "email");
        let field = find_field(session.preview(), &key).unwrap();
        let now = Instant::now();

        assert_eq!(session.click(field, now), ClickOutcome::Nothing);
        assert!(session.highlighted(now).is_none());
        assert!(session.next_deadline().is_none());
        assert!(outbox.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enumerated_format_keeps_toolbar_open() {
        let (mut session, _) = make_session();
        let native = native_for(&session, &bullet(), "junior");
        session.select(Some(native), rect(), VIEWPORT, false);
        let now = Instant::now();
        session.format(FormatCommand::FontSize(FontSize::Lg), now).unwrap();
        let report = session.tick(now + Duration::from_secs(1));
        assert!(!report.toolbar_hidden);
        assert_eq!(
            session.document().effective_format(&bullet()).font_size,
            Some(FontSize::Lg)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_word_expansion_on_select() {
        let (mut session, _) = make_session();
        let native = native_for(&session, &bullet(), "ive yea");
        let view = session.select(Some(native), rect(), VIEWPORT, true);
        assert_eq!(view.selection.unwrap().text, "five years");
    }

    #[tokio::test(start_paused = true)]
    async fn test_format_without_selection_conflicts() {
        let (mut session, _) = make_session();
        assert!(matches!(
            session.format(FormatCommand::Italic, Instant::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_shortcut_formats_only_when_visible() {
        let (mut session, _) = make_session();
        let ctrl_i = ToolbarInput::Key {
            key: KeyPress {
                key: "i".into(),
                ctrl: true,
                meta: false,
            },
        };
        let hidden = session.toolbar_input(ctrl_i.clone(), Instant::now()).unwrap();
        assert_eq!(hidden.key, Some(KeyOutcome::Ignored));

        let native = native_for(&session, &bullet(), "five years");
        session.select(Some(native), rect(), VIEWPORT, false);
        let shown = session.toolbar_input(ctrl_i, Instant::now()).unwrap();
        assert_eq!(shown.format.unwrap().value, AttributeValue::Italic(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_emits_field_callback_and_highlight() {
        let (mut session, outbox) = make_session();
        let key = FieldKey::entry(EDUCATIONS, "school", 0);
        let field = find_field(session.preview(), &key).unwrap();
        let now = Instant::now();
        let outcome = session.click(field, now);
        assert!(matches!(outcome, ClickOutcome::Field { .. }));
        assert_eq!(session.highlighted(now), Some("field-educations-school-0"));
        assert_eq!(
            outbox.drain(),
            vec![CallbackEvent::FieldClick { field_key: key }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_edit_moves_formatting_and_rebinds_listeners() {
        let (mut session, _) = make_session();
        let now = Instant::now();
        session
            .edit(Edit::AddEntry { section: EDUCATIONS.into() }, now)
            .unwrap();
        session
            .edit(
                Edit::SetField {
                    field_key: FieldKey::entry(EDUCATIONS, "school", 1),
                    value: "Night School".into(),
                },
                now,
            )
            .unwrap();
        let native = native_for(&session, &FieldKey::entry(EDUCATIONS, "school", 0), "State");
        session.select(Some(native), rect(), VIEWPORT, false);
        session.format(FormatCommand::Underline, now).unwrap();

        // Moving flushes the pending school edit first.
        session
            .edit(
                Edit::MoveEntry {
                    section: EDUCATIONS.into(),
                    from: 0,
                    to: 1,
                },
                now,
            )
            .unwrap();
        let moved = FieldKey::entry(EDUCATIONS, "school", 1);
        assert_eq!(session.document().content.field_text(&moved).unwrap(), "State University");
        assert_eq!(session.document().effective_format(&moved).underline, Some(true));
        assert_eq!(
            session.document().content.field_text(&FieldKey::entry(EDUCATIONS, "school", 0)).unwrap(),
            "Night School"
        );
        assert!(find_field(session.preview(), &moved).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_all_listeners() {
        let (mut session, _) = make_session();
        assert!(session.bus.listener_count() > 0);
        session.close();
        assert_eq!(session.bus.listener_count(), 0);
    }
}
