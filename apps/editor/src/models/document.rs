//! The editable document: resume content plus its formatting overlay and default style.
//!
//! Structural edits go through here rather than straight to `Resume` so the overlay is
//! rekeyed in the same step. Entries are matched by persistent id; array elements
//! (bullets, details, skill items) have no identity and shift positionally.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::attributes::FormatAttributes;
use crate::format::overlay::FormatOverlay;
use crate::models::field_key::FieldKey;
use crate::models::resume::{FieldError, Resume, WORK_EXPERIENCES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDocument {
    pub content: Resume,
    #[serde(default)]
    pub overlay: FormatOverlay,
    #[serde(default = "FormatAttributes::document_default")]
    pub default_style: FormatAttributes,
}

impl Default for ResumeDocument {
    fn default() -> Self {
        Self::new(Resume::default_document())
    }
}

impl ResumeDocument {
    pub fn new(content: Resume) -> Self {
        Self {
            content,
            overlay: FormatOverlay::new(),
            default_style: FormatAttributes::document_default(),
        }
    }

    /// Overlay attributes for `key` merged over the document default.
    pub fn effective_format(&self, key: &FieldKey) -> FormatAttributes {
        self.overlay.effective(key, &self.default_style)
    }

    pub fn set_field(&mut self, key: &FieldKey, value: String) -> Result<(), FieldError> {
        self.content.set_field(key, value)
    }

    pub fn add_entry(&mut self, section: &str) -> Result<usize, FieldError> {
        self.content.add_entry(section)
    }

    pub fn remove_entry(&mut self, section: &str, index: usize) -> Result<(), FieldError> {
        let before = self.content.entry_ids(section)?;
        self.content.remove_entry(section, index)?;
        self.rekey_entries(section, &before)
    }

    pub fn move_entry(&mut self, section: &str, from: usize, to: usize) -> Result<(), FieldError> {
        let before = self.content.entry_ids(section)?;
        self.content.move_entry(section, from, to)?;
        self.rekey_entries(section, &before)
    }

    pub fn add_element(
        &mut self,
        section: &str,
        field: &str,
        index: usize,
        project: Option<usize>,
    ) -> Result<FieldKey, FieldError> {
        let key = self.content.add_element(section, field, index, project)?;
        if section == WORK_EXPERIENCES && field == "bullet" {
            // Bullets of later projects move up by one ordinal.
            let inserted = key.sub_index.unwrap_or_default();
            self.shift_elements(section, "bullet", index, |sub| {
                Some(if sub >= inserted { sub + 1 } else { sub })
            });
        }
        Ok(key)
    }

    pub fn remove_element(&mut self, key: &FieldKey) -> Result<String, FieldError> {
        let removed = self.content.remove_element(key)?;
        let gone = key.sub_index.unwrap_or_default();
        let index = key.index.unwrap_or_default();
        self.shift_elements(&key.section, &key.field, index, |sub| match sub {
            s if s == gone => None,
            s if s > gone => Some(s - 1),
            s => Some(s),
        });
        Ok(removed)
    }

    pub fn remove_project(&mut self, experience: usize, project: usize) -> Result<(), FieldError> {
        let offset = self
            .content
            .work_experiences
            .get(experience)
            .map(|exp| exp.bullet_offset(project))
            .unwrap_or_default();
        let bullets = self.content.remove_project(experience, project)?;

        self.shift_elements(WORK_EXPERIENCES, "project_name", experience, |p| match p {
            p if p == project => None,
            p if p > project => Some(p - 1),
            p => Some(p),
        });
        self.shift_elements(WORK_EXPERIENCES, "bullet", experience, |b| {
            if b < offset {
                Some(b)
            } else if b < offset + bullets {
                None
            } else {
                Some(b - bullets)
            }
        });
        Ok(())
    }

    /// Rekeys overlay entries of `section` from the `before` id order to the current one.
    fn rekey_entries(&mut self, section: &str, before: &[uuid::Uuid]) -> Result<(), FieldError> {
        let after: HashMap<uuid::Uuid, usize> = self
            .content
            .entry_ids(section)?
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let mut moved = 0usize;
        self.overlay.rekey(|key| {
            if key.section != section {
                return Some(key.clone());
            }
            let old = key.index?;
            let new = *after.get(before.get(old)?)?;
            if new != old {
                moved += 1;
            }
            Some(FieldKey {
                index: Some(new),
                ..key.clone()
            })
        });
        debug!(section, moved, "Rekeyed format overlay after entry change");
        Ok(())
    }

    fn shift_elements<F>(&mut self, section: &str, field: &str, index: usize, mut shift: F)
    where
        F: FnMut(usize) -> Option<usize>,
    {
        self.overlay.rekey(|key| {
            if key.section != section || key.field != field || key.index != Some(index) {
                return Some(key.clone());
            }
            let sub = key.sub_index?;
            shift(sub).map(|new| FieldKey {
                sub_index: Some(new),
                ..key.clone()
            })
        });
    }
}
