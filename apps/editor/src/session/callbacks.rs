//! Upstream callbacks exposed by the editor core.

use std::sync::Mutex;

use serde::Serialize;

use crate::format::attributes::{AttributeValue, FormatAttribute};
use crate::models::field_key::FieldKey;
use crate::preview::resolver::TextSelection;

/// Receives formatting decisions and navigation events from an editor session.
pub trait EditorCallbacks: Send + Sync {
    fn on_format_change(&self, selection: &TextSelection, value: AttributeValue);
    /// Every attribute in `cleared` is back to its default on `selection`.
    fn on_format_cleared(&self, selection: &TextSelection, cleared: &[FormatAttribute]);
    fn on_field_click(&self, field_key: &FieldKey);
    fn on_section_click(&self, section: &str, index: Option<usize>);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "callback", rename_all = "snake_case")]
pub enum CallbackEvent {
    FormatChange {
        selection: TextSelection,
        value: AttributeValue,
    },
    FormatCleared {
        selection: TextSelection,
        cleared: Vec<FormatAttribute>,
    },
    FieldClick {
        field_key: FieldKey,
    },
    SectionClick {
        section: String,
        index: Option<usize>,
    },
}

/// Buffers callback events until the HTTP layer drains them into a response.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Mutex<Vec<CallbackEvent>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<CallbackEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, event: CallbackEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl EditorCallbacks for Outbox {
    fn on_format_change(&self, selection: &TextSelection, value: AttributeValue) {
        self.push(CallbackEvent::FormatChange {
            selection: selection.clone(),
            value,
        });
    }

    fn on_format_cleared(&self, selection: &TextSelection, cleared: &[FormatAttribute]) {
        self.push(CallbackEvent::FormatCleared {
            selection: selection.clone(),
            cleared: cleared.to_vec(),
        });
    }

    fn on_field_click(&self, field_key: &FieldKey) {
        self.push(CallbackEvent::FieldClick {
            field_key: field_key.clone(),
        });
    }

    fn on_section_click(&self, section: &str, index: Option<usize>) {
        self.push(CallbackEvent::SectionClick {
            section: section.to_string(),
            index,
        });
    }
}
