//! Format Store: a sparse `FieldKey → FormatAttributes` overlay over one document default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::format::attributes::{AttributeValue, FormatAttributes};
use crate::models::field_key::FieldKey;

/// One overlay record in its wire form (JSON maps cannot carry struct keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    pub field_key: FieldKey,
    pub attributes: FormatAttributes,
}

/// Sparse per-field formatting. Entries are only created by the formatting
/// applicator and are never cleared implicitly by content edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<OverlayEntry>", into = "Vec<OverlayEntry>")]
pub struct FormatOverlay {
    entries: BTreeMap<FieldKey, FormatAttributes>,
}

impl FormatOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FieldKey) -> Option<&FormatAttributes> {
        self.entries.get(key)
    }

    /// Overlay attributes merged over `defaults`, attribute by attribute.
    pub fn effective(&self, key: &FieldKey, defaults: &FormatAttributes) -> FormatAttributes {
        match self.entries.get(key) {
            Some(over) => defaults.merged_with(over),
            None => *defaults,
        }
    }

    pub fn set(&mut self, key: &FieldKey, value: AttributeValue) {
        self.entries.entry(key.clone()).or_default().set(value);
    }

    /// Removes every attribute stored for `key`.
    pub fn clear_field(&mut self, key: &FieldKey) -> Option<FormatAttributes> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites every key through `map`; keys mapped to `None` are dropped.
    ///
    /// Used after structural edits so formatting follows the entry it was applied to.
    pub fn rekey<F>(&mut self, mut map: F)
    where
        F: FnMut(&FieldKey) -> Option<FieldKey>,
    {
        let old = std::mem::take(&mut self.entries);
        for (key, attributes) in old {
            if let Some(new_key) = map(&key) {
                self.entries.insert(new_key, attributes);
            }
        }
    }
}

impl From<Vec<OverlayEntry>> for FormatOverlay {
    fn from(entries: Vec<OverlayEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|e| !e.attributes.is_empty())
                .map(|e| (e.field_key, e.attributes))
                .collect(),
        }
    }
}

impl From<FormatOverlay> for Vec<OverlayEntry> {
    fn from(overlay: FormatOverlay) -> Self {
        overlay
            .entries
            .into_iter()
            .map(|(field_key, attributes)| OverlayEntry {
                field_key,
                attributes,
            })
            .collect()
    }
}
