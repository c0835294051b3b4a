//! Field addressing: the composite key that names one editable leaf of a resume.
//!
//! A `FieldKey` is positional: `index` is the entry position inside a repeatable
//! section and `sub_index` the element position inside an array field. Keys are
//! recomputed from current array positions on every render; structural edits that
//! move entries rekey the format overlay (see `ResumeDocument`) so formatting keeps
//! following the entry the user intended.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a single text/array leaf in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldKey {
    pub section: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<usize>,
}

impl FieldKey {
    /// Key for a non-repeating field such as `personal_info.name`.
    pub fn scalar(section: &str, field: &str) -> Self {
        Self {
            section: section.to_string(),
            field: field.to_string(),
            index: None,
            sub_index: None,
        }
    }

    /// Key for a field of the `index`-th entry of a repeatable section.
    pub fn entry(section: &str, field: &str, index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::scalar(section, field)
        }
    }

    /// Key for the `sub_index`-th element of an array field of an entry.
    pub fn element(section: &str, field: &str, index: usize, sub_index: usize) -> Self {
        Self {
            index: Some(index),
            sub_index: Some(sub_index),
            ..Self::scalar(section, field)
        }
    }

    /// DOM id of the form control bound to this key.
    ///
    /// Form and preview share this convention, which is what lets a click in the
    /// preview find its input.
    pub fn control_id(&self) -> String {
        let mut id = format!("field-{}-{}", self.section, self.field);
        if let Some(index) = self.index {
            id.push_str(&format!("-{index}"));
        }
        if let Some(sub) = self.sub_index {
            id.push_str(&format!("-{sub}"));
        }
        id
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.field)?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        if let Some(sub) = self.sub_index {
            write!(f, "[{sub}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_indices() {
        let key = FieldKey::element("work_experiences", "bullet", 0, 2);
        assert_eq!(key.to_string(), "work_experiences.bullet[0][2]");
        assert_eq!(
            FieldKey::scalar("personal_info", "name").to_string(),
            "personal_info.name"
        );
    }

    #[test]
    fn test_control_id_matches_form_convention() {
        let key = FieldKey::element("skills", "item", 1, 3);
        assert_eq!(key.control_id(), "field-skills-item-1-3");
    }

    #[test]
    fn test_serializes_camel_case_and_omits_missing_indices() {
        let json = serde_json::to_value(FieldKey::element("projects", "bullet", 1, 0)).unwrap();
        assert_eq!(json["subIndex"], 0);
        let scalar = serde_json::to_value(FieldKey::scalar("personal_info", "email")).unwrap();
        assert!(scalar.get("index").is_none());
    }
}
