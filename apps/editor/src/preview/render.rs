//! Renders a `ResumeDocument` into a fresh `PreviewTree`.
//!
//! Every editable leaf becomes a `Field` element carrying the field-marker attributes
//! below and the field's effective style. Nothing else in the tree carries
//! `data-field`, so a node with no `Field` ancestor belongs to no field.

use crate::models::document::ResumeDocument;
use crate::models::field_key::FieldKey;
use crate::models::resume::{
    EDUCATIONS, PERSONAL_INFO, PROJECTS, SKILLS, WORK_EXPERIENCES,
};
use crate::preview::tree::{NodeId, PreviewTree, Tag};

pub const ATTR_SECTION: &str = "data-section";
pub const ATTR_FIELD: &str = "data-field";
pub const ATTR_INDEX: &str = "data-index";
pub const ATTR_SUB_INDEX: &str = "data-sub-index";
pub const ATTR_ID: &str = "id";

/// Anchor id used by section jump navigation.
pub fn section_anchor(section: &str) -> String {
    format!("section-{section}")
}

fn section_title(section: &str) -> &'static str {
    match section {
        WORK_EXPERIENCES => "Experience",
        EDUCATIONS => "Education",
        PROJECTS => "Projects",
        SKILLS => "Skills",
        _ => "",
    }
}

struct Renderer<'a> {
    doc: &'a ResumeDocument,
    tree: PreviewTree,
}

/// Builds the preview for `doc`. Pure: the same document always yields the same
/// structure.
pub fn render(doc: &ResumeDocument) -> PreviewTree {
    let mut r = Renderer {
        doc,
        tree: PreviewTree::new(),
    };
    r.personal_info();
    r.work_experiences();
    r.educations();
    r.projects();
    r.skills();
    r.tree
}

impl<'a> Renderer<'a> {
    // ── building blocks ────────────────────────────────────────────────────

    fn section(&mut self, section: &str) -> NodeId {
        let root = self.tree.root();
        let node = self.tree.create_element(Tag::Section);
        self.tree.set_attr(node, ATTR_ID, section_anchor(section));
        self.tree.set_attr(node, ATTR_SECTION, section);
        self.tree.append_child(root, node);

        let title = section_title(section);
        if !title.is_empty() {
            let heading = self.child(node, Tag::Heading);
            self.text(heading, title);
        }
        node
    }

    fn entry(&mut self, section_node: NodeId, section: &str, index: usize) -> NodeId {
        let entry = self.child(section_node, Tag::Entry);
        self.tree.set_attr(entry, ATTR_SECTION, section);
        self.tree.set_attr(entry, ATTR_INDEX, index.to_string());
        entry
    }

    fn child(&mut self, parent: NodeId, tag: Tag) -> NodeId {
        let node = self.tree.create_element(tag);
        self.tree.append_child(parent, node);
        node
    }

    fn text(&mut self, parent: NodeId, text: &str) {
        let node = self.tree.create_text(text);
        self.tree.append_child(parent, node);
    }

    /// Appends a field leaf for `key`. Missing content renders as an empty field so
    /// the marker is still present.
    fn field(&mut self, parent: NodeId, key: FieldKey) -> NodeId {
        let node = self.tree.create_element(Tag::Field);
        self.tree.set_attr(node, ATTR_SECTION, key.section.as_str());
        self.tree.set_attr(node, ATTR_FIELD, key.field.as_str());
        if let Some(index) = key.index {
            self.tree.set_attr(node, ATTR_INDEX, index.to_string());
        }
        if let Some(sub) = key.sub_index {
            self.tree.set_attr(node, ATTR_SUB_INDEX, sub.to_string());
        }
        let style = self.doc.effective_format(&key).resolve();
        if let Some(el) = self.tree.element_mut(node) {
            el.style = Some(style);
        }
        let text = self.doc.content.field_text(&key).unwrap_or_default().to_string();
        self.tree.append_child(parent, node);
        self.text(node, &text);
        node
    }

    /// A line of fields joined by `separator`. Empty fields still get a marker so a
    /// fresh entry stays clickable; separators only sit between filled ones.
    fn joined_line(&mut self, parent: NodeId, keys: Vec<FieldKey>, separator: &str) {
        let line = self.child(parent, Tag::Line);
        let mut filled_before = false;
        for key in keys {
            let filled = self
                .doc
                .content
                .field_text(&key)
                .is_ok_and(|t| !t.trim().is_empty());
            if filled && filled_before {
                self.text(line, separator);
            }
            filled_before |= filled;
            self.field(line, key);
        }
    }

    // ── sections ───────────────────────────────────────────────────────────

    fn personal_info(&mut self) {
        let section = self.section(PERSONAL_INFO);
        let scalar = |f: &str| FieldKey::scalar(PERSONAL_INFO, f);

        let heading = self.child(section, Tag::Heading);
        self.field(heading, scalar("name"));
        let title = self.child(section, Tag::Line);
        self.field(title, scalar("title"));
        self.joined_line(
            section,
            vec![scalar("email"), scalar("phone"), scalar("location"), scalar("website")],
            " · ",
        );
        let summary = self.child(section, Tag::Line);
        self.field(summary, scalar("summary"));
    }

    fn work_experiences(&mut self) {
        let experiences = &self.doc.content.work_experiences;
        if experiences.is_empty() {
            return;
        }
        let shape: Vec<Vec<usize>> = experiences
            .iter()
            .map(|exp| exp.projects.iter().map(|p| p.bullets.len()).collect())
            .collect();

        let section = self.section(WORK_EXPERIENCES);
        for (i, projects) in shape.into_iter().enumerate() {
            let entry = self.entry(section, WORK_EXPERIENCES, i);
            let key = |f: &str| FieldKey::entry(WORK_EXPERIENCES, f, i);

            self.joined_line(entry, vec![key("job_title"), key("company"), key("location")], ", ");
            self.joined_line(entry, vec![key("start_date"), key("end_date")], " – ");

            let mut ordinal = 0;
            for (p, bullets) in projects.into_iter().enumerate() {
                let name = self.child(entry, Tag::Line);
                self.field(name, FieldKey::element(WORK_EXPERIENCES, "project_name", i, p));
                for _ in 0..bullets {
                    let item = self.child(entry, Tag::ListItem);
                    self.field(item, FieldKey::element(WORK_EXPERIENCES, "bullet", i, ordinal));
                    ordinal += 1;
                }
            }
        }
    }

    fn educations(&mut self) {
        let details: Vec<usize> = self
            .doc
            .content
            .educations
            .iter()
            .map(|e| e.details.len())
            .collect();
        if details.is_empty() {
            return;
        }
        let section = self.section(EDUCATIONS);
        for (i, count) in details.into_iter().enumerate() {
            let entry = self.entry(section, EDUCATIONS, i);
            let key = |f: &str| FieldKey::entry(EDUCATIONS, f, i);

            self.joined_line(entry, vec![key("degree"), key("field_of_study")], ", ");
            self.joined_line(entry, vec![key("school")], "");
            self.joined_line(entry, vec![key("start_date"), key("end_date")], " – ");
            for d in 0..count {
                let item = self.child(entry, Tag::ListItem);
                self.field(item, FieldKey::element(EDUCATIONS, "detail", i, d));
            }
        }
    }

    fn projects(&mut self) {
        let bullets: Vec<usize> = self
            .doc
            .content
            .projects
            .iter()
            .map(|p| p.bullets.len())
            .collect();
        if bullets.is_empty() {
            return;
        }
        let section = self.section(PROJECTS);
        for (i, count) in bullets.into_iter().enumerate() {
            let entry = self.entry(section, PROJECTS, i);
            self.joined_line(
                entry,
                vec![FieldKey::entry(PROJECTS, "name", i), FieldKey::entry(PROJECTS, "link", i)],
                " | ",
            );
            for b in 0..count {
                let item = self.child(entry, Tag::ListItem);
                self.field(item, FieldKey::element(PROJECTS, "bullet", i, b));
            }
        }
    }

    fn skills(&mut self) {
        let items: Vec<usize> = self
            .doc
            .content
            .skills
            .iter()
            .map(|g| g.items.len())
            .collect();
        if items.is_empty() {
            return;
        }
        let section = self.section(SKILLS);
        for (i, count) in items.into_iter().enumerate() {
            let entry = self.entry(section, SKILLS, i);
            let line = self.child(entry, Tag::Line);
            self.field(line, FieldKey::entry(SKILLS, "category", i));
            self.text(line, ": ");
            for s in 0..count {
                if s > 0 {
                    self.text(line, ", ");
                }
                self.field(line, FieldKey::element(SKILLS, "item", i, s));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::attributes::{AttributeValue, FontSize};
    use crate::preview::resolver::find_field;

    fn field_nodes(tree: &PreviewTree) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|n| tree.tag(*n) == Some(Tag::Field))
            .collect()
    }

    #[test]
    fn test_every_field_key_is_rendered_once() {
        let doc = ResumeDocument::default();
        let tree = render(&doc);
        let rendered = field_nodes(&tree).len();
        assert_eq!(rendered, doc.content.field_keys().len());
    }

    #[test]
    fn test_sections_carry_anchor_ids_in_order() {
        let tree = render(&ResumeDocument::default());
        let anchors: Vec<&str> = tree
            .children(tree.root())
            .iter()
            .filter_map(|n| tree.attr(*n, ATTR_ID))
            .collect();
        assert_eq!(
            anchors,
            vec![
                "section-personal_info",
                "section-work_experiences",
                "section-educations",
                "section-projects",
                "section-skills"
            ]
        );
    }

    #[test]
    fn test_bullet_markers_use_flattened_ordinal() {
        let tree = render(&ResumeDocument::default());
        let third = field_nodes(&tree)
            .into_iter()
            .find(|n| {
                tree.attr(*n, ATTR_FIELD) == Some("bullet")
                    && tree.attr(*n, ATTR_SECTION) == Some(WORK_EXPERIENCES)
                    && tree.attr(*n, ATTR_SUB_INDEX) == Some("2")
            })
            .unwrap();
        assert!(tree.text_content(third).contains("five years"));
        assert_eq!(tree.attr(third, ATTR_INDEX), Some("0"));
    }

    #[test]
    fn test_field_style_reflects_overlay() {
        let mut doc = ResumeDocument::default();
        let name = FieldKey::scalar(PERSONAL_INFO, "name");
        doc.overlay.set(&name, AttributeValue::FontSize(FontSize::Xl));
        let tree = render(&doc);
        let node = field_nodes(&tree)
            .into_iter()
            .find(|n| tree.attr(*n, ATTR_FIELD) == Some("name"))
            .unwrap();
        let style = tree.element(node).unwrap().style.unwrap();
        assert_eq!(style.font_size, FontSize::Xl);
    }

    #[test]
    fn test_blank_entry_fields_keep_markers() {
        let mut doc = ResumeDocument::default();
        let index = doc.add_entry(EDUCATIONS).unwrap();
        doc.set_field(&FieldKey::entry(EDUCATIONS, "field_of_study", index), "Physics".into())
            .unwrap();
        let tree = render(&doc);

        let school = find_field(&tree, &FieldKey::entry(EDUCATIONS, "school", index)).unwrap();
        assert_eq!(tree.text_content(school), "");
        assert!(find_field(&tree, &FieldKey::entry(EDUCATIONS, "degree", index)).is_some());
        assert_eq!(field_nodes(&tree).len(), doc.content.field_keys().len());

        // No leading separator before the only filled field.
        let degree = find_field(&tree, &FieldKey::entry(EDUCATIONS, "degree", index)).unwrap();
        let line = tree.parent(degree).unwrap();
        assert_eq!(tree.text_content(line), "Physics");
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut doc = ResumeDocument::default();
        doc.content.projects.clear();
        let tree = render(&doc);
        assert!(tree
            .children(tree.root())
            .iter()
            .all(|n| tree.attr(*n, ATTR_SECTION) != Some(PROJECTS)));
    }
}
