//! Selection Toolbar Controller: visibility, placement and interaction locking of the
//! floating format toolbar.
//!
//! ```text
//!  Hidden ──selection──▶ VisibleIdle ──enter/popover──▶ VisibleInteracting
//!    ▲                      │  ▲                            │      ▲
//!    │   outside/Esc/empty  │  └──────── (none) ────────────┘      │ re-entry
//!    ├──────────────────────┘                          leave all   │ (timer cancelled)
//!    │                                                      ▼      │
//!    └────────────── grace elapsed ─────────────── VisiblePendingHide
//! ```
//!
//! Timers are deadlines, not threads: the owner calls `tick(now)` and the controller
//! fires whatever has come due. Cancelling the grace timer clears its deadline.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::format::attributes::FormatCommand;
use crate::preview::events::{EventBus, KeyDown, PointerDown, SelectionChange, Subscriber, Subscription, Target};
use crate::preview::resolver::TextSelection;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Viewport-relative rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub bounds: Rect,
    /// False when flipped below the selection.
    pub above: bool,
}

/// Centers the toolbar over `selection`, clamped horizontally inside the viewport by
/// `margin`; placed above when it fits, otherwise flipped below.
pub fn compute_placement(selection: Rect, viewport: Viewport, config: &ToolbarConfig) -> Placement {
    let (w, h) = (config.width, config.height);
    let max_x = (viewport.width - config.margin - w).max(config.margin);
    let x = (selection.x + selection.width / 2.0 - w / 2.0).clamp(config.margin, max_x);

    let above_y = selection.y - config.gap - h;
    let (y, above) = if above_y >= config.margin {
        (above_y, true)
    } else {
        (selection.bottom() + config.gap, false)
    };
    Placement {
        bounds: Rect {
            x,
            y,
            width: w,
            height: h,
        },
        above,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolbarState {
    Hidden,
    VisibleIdle,
    VisibleInteracting,
    VisiblePendingHide,
}

impl ToolbarState {
    pub fn is_visible(self) -> bool {
        self != ToolbarState::Hidden
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Popover {
    FontFamily,
    FontSize,
    LetterSpacing,
    LineHeight,
}

/// A toolbar surface the pointer can be over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "surface", content = "popover", rename_all = "snake_case")]
pub enum Surface {
    Toolbar,
    Popover(Popover),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "command", rename_all = "snake_case")]
pub enum KeyOutcome {
    /// Not intercepted; the host handles the key.
    Ignored,
    Hidden,
    Format(FormatCommand),
}

#[derive(Debug, Clone)]
pub struct ToolbarConfig {
    pub grace: Duration,
    pub dismiss_delay: Duration,
    pub margin: f32,
    pub gap: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(200),
            dismiss_delay: Duration::from_millis(150),
            margin: 8.0,
            gap: 8.0,
            width: 320.0,
            height: 40.0,
        }
    }
}

#[derive(Debug)]
struct ToolbarListeners {
    selection: Subscription<SelectionChange>,
    pointer_down: Subscription<PointerDown>,
    key_down: Subscription<KeyDown>,
}

#[derive(Debug)]
pub struct ToolbarController {
    config: ToolbarConfig,
    state: ToolbarState,
    selection: Option<TextSelection>,
    placement: Option<Placement>,
    hovered: HashSet<Surface>,
    open_popovers: HashSet<Popover>,
    grace_deadline: Option<Instant>,
    dismiss_deadline: Option<Instant>,
    listeners: Option<ToolbarListeners>,
}

/// Snapshot handed to the host for drawing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarView {
    pub state: ToolbarState,
    pub placement: Option<Placement>,
    pub selection: Option<TextSelection>,
    pub locked: bool,
}

impl ToolbarController {
    pub fn new(config: ToolbarConfig) -> Self {
        Self {
            config,
            state: ToolbarState::Hidden,
            selection: None,
            placement: None,
            hovered: HashSet::new(),
            open_popovers: HashSet::new(),
            grace_deadline: None,
            dismiss_deadline: None,
            listeners: None,
        }
    }

    pub fn state(&self) -> ToolbarState {
        self.state
    }

    pub fn selection(&self) -> Option<&TextSelection> {
        self.selection.as_ref()
    }

    pub fn grace_deadline(&self) -> Option<Instant> {
        self.grace_deadline
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.grace_deadline, self.dismiss_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The interaction lock: the pointer is over a toolbar surface or a popover is open.
    pub fn is_locked(&self) -> bool {
        !self.hovered.is_empty() || !self.open_popovers.is_empty()
    }

    /// Only an open popover holds off a post-format dismissal; hovering the toolbar
    /// to click a format button does not.
    fn has_open_popover(&self) -> bool {
        !self.open_popovers.is_empty()
    }

    pub fn view(&self) -> ToolbarView {
        ToolbarView {
            state: self.state,
            placement: self.placement,
            selection: self.selection.clone(),
            locked: self.is_locked(),
        }
    }

    fn transition(&mut self, to: ToolbarState) {
        if self.state != to {
            debug!(from = ?self.state, to = ?to, "Toolbar transition");
            self.state = to;
        }
    }

    fn hide(&mut self) {
        self.transition(ToolbarState::Hidden);
        self.selection = None;
        self.placement = None;
        self.hovered.clear();
        self.open_popovers.clear();
        self.grace_deadline = None;
        self.dismiss_deadline = None;
    }

    fn enter_interacting(&mut self) {
        // Re-entry cancels the grace timer outright.
        self.grace_deadline = None;
        self.transition(ToolbarState::VisibleInteracting);
    }

    fn maybe_pending_hide(&mut self, now: Instant) {
        if self.state == ToolbarState::VisibleInteracting && !self.is_locked() {
            self.grace_deadline = Some(now + self.config.grace);
            self.transition(ToolbarState::VisiblePendingHide);
        }
    }

    // ── listener lifecycle ──────────────────────────────────────────────────

    /// Registers the toolbar's document listeners. Idempotent: a second attach while
    /// attached is a no-op and returns false.
    pub fn attach(&mut self, bus: &mut EventBus) -> bool {
        if self.listeners.is_some() {
            return false;
        }
        self.listeners = Some(ToolbarListeners {
            selection: bus.subscribe(Target::Document, Subscriber::Toolbar),
            pointer_down: bus.subscribe(Target::Document, Subscriber::Toolbar),
            key_down: bus.subscribe(Target::Document, Subscriber::Toolbar),
        });
        true
    }

    pub fn detach(&mut self, bus: &mut EventBus) {
        if let Some(listeners) = self.listeners.take() {
            bus.unsubscribe(listeners.selection);
            bus.unsubscribe(listeners.pointer_down);
            bus.unsubscribe(listeners.key_down);
        }
        self.hide();
    }

    pub fn is_attached(&self) -> bool {
        self.listeners.is_some()
    }

    // ── events ─────────────────────────────────────────────────────────────

    /// Host selection changed. `resolved` is the Field Resolver's result and `rect`
    /// the selection's bounding box.
    pub fn on_selection_change(
        &mut self,
        resolved: Option<TextSelection>,
        rect: Option<Rect>,
        viewport: Viewport,
    ) {
        match (resolved, rect) {
            (Some(selection), Some(rect)) if rect.has_area() => {
                self.placement = Some(compute_placement(rect, viewport, &self.config));
                self.selection = Some(selection);
                if self.state == ToolbarState::Hidden {
                    self.transition(ToolbarState::VisibleIdle);
                }
            }
            _ => {
                if self.state.is_visible() && !self.is_locked() {
                    self.hide();
                }
            }
        }
    }

    /// Pointer pressed somewhere in the viewport.
    pub fn on_pointer_down(&mut self, point: Point) {
        if !self.state.is_visible() || self.is_locked() {
            return;
        }
        let inside = self.placement.is_some_and(|p| p.bounds.contains(point));
        if !inside {
            self.hide();
        }
    }

    pub fn on_pointer_enter(&mut self, surface: Surface) {
        if !self.state.is_visible() {
            return;
        }
        self.hovered.insert(surface);
        self.enter_interacting();
    }

    pub fn on_pointer_leave(&mut self, surface: Surface, now: Instant) {
        self.hovered.remove(&surface);
        self.maybe_pending_hide(now);
    }

    pub fn on_popover_open(&mut self, popover: Popover) {
        if !self.state.is_visible() {
            return;
        }
        self.open_popovers.insert(popover);
        self.enter_interacting();
    }

    pub fn on_popover_close(&mut self, popover: Popover, now: Instant) {
        self.open_popovers.remove(&popover);
        self.maybe_pending_hide(now);
    }

    /// Keyboard input. Accelerators are only intercepted while the toolbar is visible.
    pub fn on_key(&mut self, key: &KeyPress) -> KeyOutcome {
        if !self.state.is_visible() {
            return KeyOutcome::Ignored;
        }
        if key.key == "Escape" {
            self.hide();
            return KeyOutcome::Hidden;
        }
        if !(key.ctrl || key.meta) {
            return KeyOutcome::Ignored;
        }
        match key.key.to_ascii_lowercase().as_str() {
            "b" => KeyOutcome::Format(FormatCommand::Bold),
            "i" => KeyOutcome::Format(FormatCommand::Italic),
            "u" => KeyOutcome::Format(FormatCommand::Underline),
            _ => KeyOutcome::Ignored,
        }
    }

    /// A boolean format was applied: hide after the dismiss delay unless a popover is open.
    pub fn request_dismiss(&mut self, now: Instant) {
        if self.state.is_visible() && !self.has_open_popover() {
            self.dismiss_deadline = Some(now + self.config.dismiss_delay);
        }
    }

    /// Fires due deadlines. Returns true if the toolbar hid.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state == ToolbarState::VisiblePendingHide
            && self.grace_deadline.is_some_and(|d| d <= now)
        {
            self.hide();
            return true;
        }
        if self.dismiss_deadline.is_some_and(|d| d <= now) {
            self.dismiss_deadline = None;
            if self.state.is_visible() && !self.has_open_popover() {
                self.hide();
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field_key::FieldKey;

    const VIEWPORT: Viewport = Viewport {
        width: 800.0,
        height: 600.0,
    };

    fn make_selection() -> TextSelection {
        TextSelection {
            field_key: FieldKey::element("work_experiences", "bullet", 0, 2),
            start_index: 32,
            end_index: 42,
            text: "five years".into(),
            marker: None,
        }
    }

    fn rect_at(x: f32, y: f32) -> Rect {
        Rect {
            x,
            y,
            width: 60.0,
            height: 14.0,
        }
    }

    fn make_visible() -> ToolbarController {
        let mut toolbar = ToolbarController::new(ToolbarConfig::default());
        toolbar.on_selection_change(Some(make_selection()), Some(rect_at(300.0, 200.0)), VIEWPORT);
        assert_eq!(toolbar.state(), ToolbarState::VisibleIdle);
        toolbar
    }

    #[test]
    fn test_zero_area_selection_keeps_toolbar_hidden() {
        let mut toolbar = ToolbarController::new(ToolbarConfig::default());
        let flat = Rect {
            width: 0.0,
            ..rect_at(10.0, 10.0)
        };
        toolbar.on_selection_change(Some(make_selection()), Some(flat), VIEWPORT);
        assert_eq!(toolbar.state(), ToolbarState::Hidden);
    }

    #[test]
    fn test_placement_clamps_and_flips() {
        let config = ToolbarConfig::default();
        let left = compute_placement(rect_at(0.0, 300.0), VIEWPORT, &config);
        assert_eq!(left.bounds.x, config.margin);
        assert!(left.above);

        let right = compute_placement(rect_at(780.0, 300.0), VIEWPORT, &config);
        assert_eq!(right.bounds.x, VIEWPORT.width - config.margin - config.width);

        let top = compute_placement(rect_at(300.0, 20.0), VIEWPORT, &config);
        assert!(!top.above);
        assert_eq!(top.bounds.y, 34.0 + config.gap);
    }

    #[test]
    fn test_click_outside_hides_and_inside_does_not() {
        let mut toolbar = make_visible();
        let bounds = toolbar.view().placement.unwrap().bounds;
        toolbar.on_pointer_down(Point {
            x: bounds.x + 1.0,
            y: bounds.y + 1.0,
        });
        assert_eq!(toolbar.state(), ToolbarState::VisibleIdle);
        toolbar.on_pointer_down(Point { x: 5.0, y: 590.0 });
        assert_eq!(toolbar.state(), ToolbarState::Hidden);
        assert!(toolbar.selection().is_none());
    }

    #[test]
    fn test_empty_selection_ignored_while_locked() {
        let mut toolbar = make_visible();
        toolbar.on_popover_open(Popover::FontSize);
        toolbar.on_selection_change(None, None, VIEWPORT);
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_timer_hides_after_leave() {
        let mut toolbar = make_visible();
        toolbar.on_pointer_enter(Surface::Toolbar);
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);

        let now = Instant::now();
        toolbar.on_pointer_leave(Surface::Toolbar, now);
        assert_eq!(toolbar.state(), ToolbarState::VisiblePendingHide);
        assert!(!toolbar.tick(now + Duration::from_millis(199)));
        assert!(toolbar.tick(now + Duration::from_millis(200)));
        assert_eq!(toolbar.state(), ToolbarState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentry_cancels_grace_timer() {
        let mut toolbar = make_visible();
        toolbar.on_pointer_enter(Surface::Toolbar);
        let now = Instant::now();
        toolbar.on_pointer_leave(Surface::Toolbar, now);
        toolbar.on_pointer_enter(Surface::Popover(Popover::LineHeight));
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);
        assert!(toolbar.grace_deadline().is_none());
        assert!(!toolbar.tick(now + Duration::from_secs(5)));
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_popover_blocks_pending_hide() {
        let mut toolbar = make_visible();
        toolbar.on_popover_open(Popover::FontFamily);
        toolbar.on_pointer_enter(Surface::Toolbar);
        toolbar.on_pointer_leave(Surface::Toolbar, Instant::now());
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);
        toolbar.on_popover_close(Popover::FontFamily, Instant::now());
        assert_eq!(toolbar.state(), ToolbarState::VisiblePendingHide);
    }

    #[test]
    fn test_shortcuts_only_while_visible() {
        let mut toolbar = ToolbarController::new(ToolbarConfig::default());
        let ctrl_b = KeyPress {
            key: "b".into(),
            ctrl: true,
            meta: false,
        };
        assert_eq!(toolbar.on_key(&ctrl_b), KeyOutcome::Ignored);

        toolbar.on_selection_change(Some(make_selection()), Some(rect_at(300.0, 200.0)), VIEWPORT);
        assert_eq!(toolbar.on_key(&ctrl_b), KeyOutcome::Format(FormatCommand::Bold));
        let plain_b = KeyPress {
            ctrl: false,
            ..ctrl_b
        };
        assert_eq!(toolbar.on_key(&plain_b), KeyOutcome::Ignored);
    }

    #[test]
    fn test_escape_hides_from_any_visible_state() {
        let escape = KeyPress {
            key: "Escape".into(),
            ctrl: false,
            meta: false,
        };
        let mut toolbar = make_visible();
        toolbar.on_popover_open(Popover::FontSize);
        assert_eq!(toolbar.on_key(&escape), KeyOutcome::Hidden);
        assert_eq!(toolbar.state(), ToolbarState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_held_by_open_popover() {
        let mut toolbar = make_visible();
        let now = Instant::now();
        toolbar.request_dismiss(now);
        toolbar.on_popover_open(Popover::FontSize);
        assert!(!toolbar.tick(now + Duration::from_millis(150)));
        assert!(toolbar.state().is_visible());

        let mut held = make_visible();
        held.on_popover_open(Popover::FontSize);
        held.request_dismiss(now);
        assert_eq!(held.next_deadline(), None);

        let mut unlocked = make_visible();
        unlocked.request_dismiss(now);
        assert!(unlocked.tick(now + Duration::from_millis(150)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hovered_toolbar_still_dismisses_after_format() {
        let mut toolbar = make_visible();
        let now = Instant::now();
        toolbar.on_pointer_enter(Surface::Toolbar);
        assert_eq!(toolbar.state(), ToolbarState::VisibleInteracting);
        toolbar.request_dismiss(now);
        assert_eq!(toolbar.next_deadline(), Some(now + Duration::from_millis(150)));

        assert!(!toolbar.tick(now + Duration::from_millis(100)));
        assert!(toolbar.tick(now + Duration::from_millis(150)));
        assert_eq!(toolbar.state(), ToolbarState::Hidden);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut bus = EventBus::new();
        let mut toolbar = ToolbarController::new(ToolbarConfig::default());
        assert!(toolbar.attach(&mut bus));
        assert!(!toolbar.attach(&mut bus));
        assert_eq!(bus.count_for(Subscriber::Toolbar), 3);
        toolbar.detach(&mut bus);
        assert_eq!(bus.listener_count(), 0);
    }
}
