//! Sync Bridge: navigation between preview fields and their form controls.
//!
//! The bridge does not own the form. It knows which control ids exist (`FormRegistry`)
//! and produces `FormCommand`s for the host to perform: scroll, focus, highlight.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::field_key::FieldKey;
use crate::models::resume::Resume;
use crate::preview::events::{Click, EventBus, SelectionChange, Subscriber, Subscription, Target};
use crate::preview::render::{section_anchor, ATTR_ID};
use crate::preview::resolver::{field_nodes, parse_marker, resolve_click_target, resolve_section_target};
use crate::preview::tree::{NodeId, PreviewTree};

/// Control ids of every form input, following the `FieldKey::control_id` convention.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    controls: BTreeSet<String>,
}

impl FormRegistry {
    pub fn from_resume(resume: &Resume) -> Self {
        Self {
            controls: resume.field_keys().iter().map(FieldKey::control_id).collect(),
        }
    }

    pub fn contains(&self, control_id: &str) -> bool {
        self.controls.contains(control_id)
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBlock {
    Center,
    Start,
}

/// Instructions for the host's form and preview surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FormCommand {
    ScrollIntoView {
        target: String,
        behavior: ScrollBehavior,
        block: ScrollBlock,
    },
    Focus {
        control_id: String,
    },
    Highlight {
        control_id: String,
        duration_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClickOutcome {
    Field {
        field_key: FieldKey,
        commands: Vec<FormCommand>,
    },
    Section {
        section: String,
        index: Option<usize>,
    },
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
struct Highlight {
    control_id: String,
    until: Instant,
}

#[derive(Debug)]
struct NodeListeners {
    click: Subscription<Click>,
    selection: Subscription<SelectionChange>,
}

#[derive(Debug)]
pub struct SyncBridge {
    registry: FormRegistry,
    highlight_duration: Duration,
    highlight: Option<Highlight>,
    listeners: Vec<NodeListeners>,
}

impl SyncBridge {
    pub fn new(registry: FormRegistry, highlight_duration: Duration) -> Self {
        Self {
            registry,
            highlight_duration,
            highlight: None,
            listeners: Vec::new(),
        }
    }

    pub fn set_registry(&mut self, registry: FormRegistry) {
        self.registry = registry;
    }

    /// Control currently highlighted, if the highlight has not expired.
    pub fn highlighted(&self, now: Instant) -> Option<&str> {
        self.highlight
            .as_ref()
            .filter(|h| h.until > now)
            .map(|h| h.control_id.as_str())
    }

    pub fn highlight_deadline(&self) -> Option<Instant> {
        self.highlight.as_ref().map(|h| h.until)
    }

    /// Preview → form: scroll the matching control into view, focus it and
    /// (re)start its highlight. A second click restarts the single highlight.
    pub fn on_preview_field_click(&mut self, key: &FieldKey, now: Instant) -> Option<Vec<FormCommand>> {
        let control_id = key.control_id();
        if !self.registry.contains(&control_id) {
            debug!(field = %key, "No form control for clicked field");
            return None;
        }
        self.highlight = Some(Highlight {
            control_id: control_id.clone(),
            until: now + self.highlight_duration,
        });
        Some(vec![
            FormCommand::ScrollIntoView {
                target: control_id.clone(),
                behavior: ScrollBehavior::Smooth,
                block: ScrollBlock::Center,
            },
            FormCommand::Focus {
                control_id: control_id.clone(),
            },
            FormCommand::Highlight {
                control_id,
                duration_ms: self.highlight_duration.as_millis() as u64,
            },
        ])
    }

    /// Routes a click on a preview node: field clicks navigate to the form, clicks
    /// elsewhere inside a section report the section. A field without a bound
    /// listener (`field_bound == false`) is inert: no commands and no highlight.
    pub fn handle_click(
        &mut self,
        tree: &PreviewTree,
        node: NodeId,
        now: Instant,
        field_bound: bool,
    ) -> ClickOutcome {
        if let Some(field_key) = resolve_click_target(tree, node) {
            if !field_bound {
                return ClickOutcome::Nothing;
            }
            return match self.on_preview_field_click(&field_key, now) {
                Some(commands) => ClickOutcome::Field {
                    field_key,
                    commands,
                },
                None => ClickOutcome::Nothing,
            };
        }
        match resolve_section_target(tree, node) {
            Some((section, index)) => ClickOutcome::Section { section, index },
            None => ClickOutcome::Nothing,
        }
    }

    /// Form → preview: scroll the preview to a section anchor.
    pub fn jump_to_section(&self, tree: &PreviewTree, section: &str) -> Option<FormCommand> {
        let anchor = section_anchor(section);
        let exists = tree
            .children(tree.root())
            .iter()
            .any(|n| tree.attr(*n, ATTR_ID) == Some(anchor.as_str()));
        exists.then(|| FormCommand::ScrollIntoView {
            target: anchor,
            behavior: ScrollBehavior::Smooth,
            block: ScrollBlock::Start,
        })
    }

    /// Clears an expired highlight. Returns true if one was cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.highlight.as_ref().is_some_and(|h| h.until <= now) {
            self.highlight = None;
            return true;
        }
        false
    }

    // ── listener lifecycle ──────────────────────────────────────────────────

    /// Drops every node listener, then subscribes click and selection listeners on
    /// each field node of `tree`. Nodes with malformed markers are skipped.
    pub fn reattach(&mut self, bus: &mut EventBus, tree: &PreviewTree) -> usize {
        self.detach(bus);
        for node in field_nodes(tree) {
            match parse_marker(tree, node) {
                Ok(Some(_)) => {
                    let target = Target::Node(tree.node_ref(node));
                    self.listeners.push(NodeListeners {
                        click: bus.subscribe(target, Subscriber::SyncBridge),
                        selection: bus.subscribe(target, Subscriber::SyncBridge),
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(node = node.0, error = %err, "Skipping field node with bad marker");
                }
            }
        }
        debug!(fields = self.listeners.len(), "Sync bridge listeners attached");
        self.listeners.len()
    }

    pub fn detach(&mut self, bus: &mut EventBus) {
        for listeners in self.listeners.drain(..) {
            bus.unsubscribe(listeners.click);
            bus.unsubscribe(listeners.selection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ResumeDocument;
    use crate::models::resume::{EDUCATIONS, WORK_EXPERIENCES};
    use crate::preview::events::EventKind;
    use crate::preview::render::{render, ATTR_INDEX};
    use crate::preview::resolver::find_field;
    use crate::preview::tree::Tag;

    fn make_bridge(doc: &ResumeDocument) -> SyncBridge {
        SyncBridge::new(FormRegistry::from_resume(&doc.content), Duration::from_millis(1500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_click_focuses_matching_control() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        let mut bridge = make_bridge(&doc);
        let key = FieldKey::element(WORK_EXPERIENCES, "bullet", 0, 1);
        let field = find_field(&tree, &key).unwrap();

        let now = Instant::now();
        let ClickOutcome::Field { field_key, commands } = bridge.handle_click(&tree, field, now, true) else {
            panic!("expected a field click");
        };
        assert_eq!(field_key, key);
        assert_eq!(
            commands[1],
            FormCommand::Focus {
                control_id: "field-work_experiences-bullet-0-1".into()
            }
        );
        assert!(matches!(
            commands[0],
            FormCommand::ScrollIntoView {
                block: ScrollBlock::Center,
                ..
            }
        ));
        assert_eq!(bridge.highlighted(now), Some("field-work_experiences-bullet-0-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_click_restarts_highlight() {
        let doc = ResumeDocument::default();
        let mut bridge = make_bridge(&doc);
        let key = FieldKey::entry(EDUCATIONS, "school", 0);
        let start = Instant::now();

        bridge.on_preview_field_click(&key, start).unwrap();
        let later = start + Duration::from_millis(1000);
        bridge.on_preview_field_click(&key, later).unwrap();

        assert_eq!(bridge.highlight_deadline(), Some(later + Duration::from_millis(1500)));
        assert!(!bridge.tick(start + Duration::from_millis(1500)));
        assert!(bridge.highlighted(start + Duration::from_millis(2000)).is_some());
        assert!(bridge.tick(later + Duration::from_millis(1500)));
        assert!(bridge.highlighted(later + Duration::from_millis(1500)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_outside_field_reports_section() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        let mut bridge = make_bridge(&doc);
        let entry = tree
            .descendants(tree.root())
            .into_iter()
            .find(|n| tree.tag(*n) == Some(Tag::Entry) && tree.attr(*n, ATTR_INDEX) == Some("0"))
            .unwrap();
        assert_eq!(
            bridge.handle_click(&tree, entry, Instant::now(), false),
            ClickOutcome::Section {
                section: WORK_EXPERIENCES.into(),
                index: Some(0)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbound_field_click_is_inert() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        let mut bridge = make_bridge(&doc);
        let field = find_field(&tree, &FieldKey::scalar("personal_info", "email")).unwrap();

        let now = Instant::now();
        assert_eq!(bridge.handle_click(&tree, field, now, false), ClickOutcome::Nothing);
        assert!(bridge.highlighted(now).is_none());
        assert!(bridge.highlight_deadline().is_none());
    }

    #[test]
    fn test_jump_to_section() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        let bridge = make_bridge(&doc);
        assert_eq!(
            bridge.jump_to_section(&tree, EDUCATIONS),
            Some(FormCommand::ScrollIntoView {
                target: "section-educations".into(),
                behavior: ScrollBehavior::Smooth,
                block: ScrollBlock::Start,
            })
        );
        assert!(bridge.jump_to_section(&tree, "hobbies").is_none());
    }

    #[test]
    fn test_reattach_replaces_listeners_and_skips_bad_markers() {
        let mut doc = ResumeDocument::default();
        let mut bus = EventBus::new();
        let mut bridge = make_bridge(&doc);

        let tree = render(&doc);
        let fields = field_nodes(&tree).len();
        assert_eq!(bridge.reattach(&mut bus, &tree), fields);
        assert_eq!(bus.count_for(Subscriber::SyncBridge), fields * 2);

        doc.add_entry(EDUCATIONS).unwrap();
        doc.set_field(&FieldKey::entry(EDUCATIONS, "school", 1), "Night School".into())
            .unwrap();
        let mut grown = render(&doc);
        let bad = grown.create_element(Tag::Field);
        grown.set_attr(bad, "data-field", "school");
        grown.append_child(grown.root(), bad);

        let attached = bridge.reattach(&mut bus, &grown);
        assert_eq!(attached, field_nodes(&grown).len() - 1);
        assert_eq!(bus.count_for(Subscriber::SyncBridge), attached * 2);

        let school = find_field(&grown, &FieldKey::entry(EDUCATIONS, "school", 1)).unwrap();
        let text = grown.children(school)[0];
        assert_eq!(
            bus.dispatch(EventKind::Click, &grown, Some(grown.node_ref(text))),
            vec![Subscriber::SyncBridge]
        );
    }
}
