//! Canonical resume content: the Document Model the form edits and the preview renders.
//!
//! Sections and their editable leaves:
//!
//! | section            | entry fields                                     | array fields                 |
//! |--------------------|--------------------------------------------------|------------------------------|
//! | `personal_info`    | name, title, email, phone, location, website, summary (no index) | -           |
//! | `work_experiences` | company, job_title, location, start_date, end_date | project_name, bullet       |
//! | `educations`       | school, degree, field_of_study, start_date, end_date | detail                   |
//! | `projects`         | name, link                                       | bullet                       |
//! | `skills`           | category                                         | item                         |
//!
//! Work-experience bullets live inside projects but are addressed by one ordinal
//! flattened across the experience's projects in order, so a `FieldKey` never needs a
//! third index.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::field_key::FieldKey;

pub const PERSONAL_INFO: &str = "personal_info";
pub const WORK_EXPERIENCES: &str = "work_experiences";
pub const EDUCATIONS: &str = "educations";
pub const PROJECTS: &str = "projects";
pub const SKILLS: &str = "skills";

/// Render order of the sections.
pub const SECTION_ORDER: [&str; 5] = [PERSONAL_INFO, WORK_EXPERIENCES, EDUCATIONS, PROJECTS, SKILLS];

const PERSONAL_FIELDS: &[&str] = &["name", "title", "email", "phone", "location", "website", "summary"];
const WORK_FIELDS: &[&str] = &["company", "job_title", "location", "start_date", "end_date"];
const WORK_ELEMENTS: &[&str] = &["project_name", "bullet"];
const EDUCATION_FIELDS: &[&str] = &["school", "degree", "field_of_study", "start_date", "end_date"];
const EDUCATION_ELEMENTS: &[&str] = &["detail"];
const PROJECT_FIELDS: &[&str] = &["name", "link"];
const PROJECT_ELEMENTS: &[&str] = &["bullet"];
const SKILL_FIELDS: &[&str] = &["category"];
const SKILL_ELEMENTS: &[&str] = &["item"];

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown section '{0}'")]
    UnknownSection(String),

    #[error("unknown field '{field}' in section '{section}'")]
    UnknownField { section: String, field: String },

    #[error("{0}: missing index")]
    MissingIndex(FieldKey),

    #[error("{0}: unexpected index on a non-repeating field")]
    UnexpectedIndex(FieldKey),

    #[error("{0}: index out of range")]
    OutOfRange(FieldKey),

    #[error("section '{0}' has no repeatable entries")]
    NotRepeatable(String),
}

/// How a field is addressed within its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// No index: `personal_info.*`.
    Scalar,
    /// `index` selects the entry.
    EntryField,
    /// `index` selects the entry, `sub_index` the array element.
    EntryElement,
}

/// Looks up the addressing shape of `section.field`.
pub fn field_shape(section: &str, field: &str) -> Result<FieldShape, FieldError> {
    let (fields, elements): (&[&str], &[&str]) = match section {
        PERSONAL_INFO => (PERSONAL_FIELDS, &[]),
        WORK_EXPERIENCES => (WORK_FIELDS, WORK_ELEMENTS),
        EDUCATIONS => (EDUCATION_FIELDS, EDUCATION_ELEMENTS),
        PROJECTS => (PROJECT_FIELDS, PROJECT_ELEMENTS),
        SKILLS => (SKILL_FIELDS, SKILL_ELEMENTS),
        other => return Err(FieldError::UnknownSection(other.to_string())),
    };
    if elements.contains(&field) {
        Ok(FieldShape::EntryElement)
    } else if fields.contains(&field) && section == PERSONAL_INFO {
        Ok(FieldShape::Scalar)
    } else if fields.contains(&field) {
        Ok(FieldShape::EntryField)
    } else {
        Err(FieldError::UnknownField {
            section: section.to_string(),
            field: field.to_string(),
        })
    }
}

/// Checks that `key` names a known field and carries exactly the indices its shape needs.
pub fn validate_key(key: &FieldKey) -> Result<FieldShape, FieldError> {
    let shape = field_shape(&key.section, &key.field)?;
    let ok = match shape {
        FieldShape::Scalar => {
            if key.index.is_some() || key.sub_index.is_some() {
                return Err(FieldError::UnexpectedIndex(key.clone()));
            }
            true
        }
        FieldShape::EntryField => key.index.is_some() && key.sub_index.is_none(),
        FieldShape::EntryElement => key.index.is_some() && key.sub_index.is_some(),
    };
    if ok {
        Ok(shape)
    } else {
        Err(FieldError::MissingIndex(key.clone()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    pub summary: String,
}

impl PersonalInfo {
    fn field(&self, name: &str) -> Option<&String> {
        Some(match name {
            "name" => &self.name,
            "title" => &self.title,
            "email" => &self.email,
            "phone" => &self.phone,
            "location" => &self.location,
            "website" => &self.website,
            "summary" => &self.summary,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "name" => &mut self.name,
            "title" => &mut self.title,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "location" => &mut self.location,
            "website" => &mut self.website,
            "summary" => &mut self.summary,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

impl Project {
    pub fn new(name: &str, bullets: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bullets: bullets.iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl WorkExperience {
    fn field(&self, name: &str) -> Option<&String> {
        Some(match name {
            "company" => &self.company,
            "job_title" => &self.job_title,
            "location" => &self.location,
            "start_date" => &self.start_date,
            "end_date" => &self.end_date,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "company" => &mut self.company,
            "job_title" => &mut self.job_title,
            "location" => &mut self.location,
            "start_date" => &mut self.start_date,
            "end_date" => &mut self.end_date,
            _ => return None,
        })
    }

    /// Flattened ordinal of the first bullet of `project`.
    pub fn bullet_offset(&self, project: usize) -> usize {
        self.projects
            .iter()
            .take(project)
            .map(|p| p.bullets.len())
            .sum()
    }

    pub fn bullet_count(&self) -> usize {
        self.projects.iter().map(|p| p.bullets.len()).sum()
    }

    /// Maps a flattened bullet ordinal to `(project, bullet)`.
    pub fn locate_bullet(&self, ordinal: usize) -> Option<(usize, usize)> {
        let mut remaining = ordinal;
        for (p, project) in self.projects.iter().enumerate() {
            if remaining < project.bullets.len() {
                return Some((p, remaining));
            }
            remaining -= project.bullets.len();
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub field_of_study: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl Education {
    fn field(&self, name: &str) -> Option<&String> {
        Some(match name {
            "school" => &self.school,
            "degree" => &self.degree,
            "field_of_study" => &self.field_of_study,
            "start_date" => &self.start_date,
            "end_date" => &self.end_date,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "school" => &mut self.school,
            "degree" => &mut self.degree,
            "field_of_study" => &mut self.field_of_study,
            "start_date" => &mut self.start_date,
            "end_date" => &mut self.end_date,
            _ => return None,
        })
    }
}

/// A personal/side project (top-level `projects` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideProject {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGroup {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resume {
    pub personal_info: PersonalInfo,
    pub work_experiences: Vec<WorkExperience>,
    pub educations: Vec<Education>,
    pub projects: Vec<SideProject>,
    pub skills: Vec<SkillGroup>,
}

// ────────────────────────────────────────────────────────────────────────────
// Field access
// ────────────────────────────────────────────────────────────────────────────

impl Resume {
    /// Returns the stored text of the leaf addressed by `key`.
    pub fn field_text(&self, key: &FieldKey) -> Result<&str, FieldError> {
        validate_key(key)?;
        let oob = || FieldError::OutOfRange(key.clone());
        let index = key.index.unwrap_or_default();
        let sub = key.sub_index.unwrap_or_default();

        let slot = match key.section.as_str() {
            PERSONAL_INFO => self.personal_info.field(&key.field),
            WORK_EXPERIENCES => {
                let exp = self.work_experiences.get(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "project_name" => exp.projects.get(sub).map(|p| &p.name),
                    "bullet" => exp
                        .locate_bullet(sub)
                        .map(|(p, b)| &exp.projects[p].bullets[b]),
                    field => exp.field(field),
                }
            }
            EDUCATIONS => {
                let edu = self.educations.get(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "detail" => edu.details.get(sub),
                    field => edu.field(field),
                }
            }
            PROJECTS => {
                let project = self.projects.get(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "name" => Some(&project.name),
                    "link" => Some(&project.link),
                    _ => project.bullets.get(sub),
                }
            }
            SKILLS => {
                let group = self.skills.get(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "category" => Some(&group.category),
                    _ => group.items.get(sub),
                }
            }
            other => return Err(FieldError::UnknownSection(other.to_string())),
        };
        slot.map(String::as_str).ok_or_else(oob)
    }

    /// Overwrites the leaf addressed by `key`.
    pub fn set_field(&mut self, key: &FieldKey, value: String) -> Result<(), FieldError> {
        validate_key(key)?;
        let oob = || FieldError::OutOfRange(key.clone());
        let index = key.index.unwrap_or_default();
        let sub = key.sub_index.unwrap_or_default();

        let slot = match key.section.as_str() {
            PERSONAL_INFO => self.personal_info.field_mut(&key.field),
            WORK_EXPERIENCES => {
                let exp = self.work_experiences.get_mut(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "project_name" => exp.projects.get_mut(sub).map(|p| &mut p.name),
                    "bullet" => match exp.locate_bullet(sub) {
                        Some((p, b)) => Some(&mut exp.projects[p].bullets[b]),
                        None => None,
                    },
                    field => exp.field_mut(field),
                }
            }
            EDUCATIONS => {
                let edu = self.educations.get_mut(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "detail" => edu.details.get_mut(sub),
                    field => edu.field_mut(field),
                }
            }
            PROJECTS => {
                let project = self.projects.get_mut(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "name" => Some(&mut project.name),
                    "link" => Some(&mut project.link),
                    _ => project.bullets.get_mut(sub),
                }
            }
            SKILLS => {
                let group = self.skills.get_mut(index).ok_or_else(oob)?;
                match key.field.as_str() {
                    "category" => Some(&mut group.category),
                    _ => group.items.get_mut(sub),
                }
            }
            other => return Err(FieldError::UnknownSection(other.to_string())),
        };
        *slot.ok_or_else(oob)? = value;
        Ok(())
    }

    /// Number of entries in a repeatable section.
    pub fn entry_count(&self, section: &str) -> Result<usize, FieldError> {
        Ok(self.entry_ids(section)?.len())
    }

    /// Persistent ids of a repeatable section's entries, in current order.
    pub fn entry_ids(&self, section: &str) -> Result<Vec<Uuid>, FieldError> {
        Ok(match section {
            WORK_EXPERIENCES => self.work_experiences.iter().map(|e| e.id).collect(),
            EDUCATIONS => self.educations.iter().map(|e| e.id).collect(),
            PROJECTS => self.projects.iter().map(|e| e.id).collect(),
            SKILLS => self.skills.iter().map(|e| e.id).collect(),
            PERSONAL_INFO => return Err(FieldError::NotRepeatable(section.to_string())),
            other => return Err(FieldError::UnknownSection(other.to_string())),
        })
    }

    // ── structural edits (content only; overlay rekeying lives in ResumeDocument) ──

    /// Appends a blank entry and returns its index.
    pub fn add_entry(&mut self, section: &str) -> Result<usize, FieldError> {
        let index = self.entry_count(section)?;
        match section {
            WORK_EXPERIENCES => self.work_experiences.push(WorkExperience {
                id: Uuid::new_v4(),
                company: String::new(),
                job_title: String::new(),
                location: String::new(),
                start_date: String::new(),
                end_date: String::new(),
                projects: vec![Project::new("", &[])],
            }),
            EDUCATIONS => self.educations.push(Education {
                id: Uuid::new_v4(),
                school: String::new(),
                degree: String::new(),
                field_of_study: String::new(),
                start_date: String::new(),
                end_date: String::new(),
                details: Vec::new(),
            }),
            PROJECTS => self.projects.push(SideProject {
                id: Uuid::new_v4(),
                name: String::new(),
                link: String::new(),
                bullets: Vec::new(),
            }),
            _ => self.skills.push(SkillGroup {
                id: Uuid::new_v4(),
                category: String::new(),
                items: Vec::new(),
            }),
        }
        Ok(index)
    }

    pub fn remove_entry(&mut self, section: &str, index: usize) -> Result<(), FieldError> {
        let count = self.entry_count(section)?;
        if index >= count {
            return Err(FieldError::OutOfRange(FieldKey::entry(section, "*", index)));
        }
        match section {
            WORK_EXPERIENCES => drop(self.work_experiences.remove(index)),
            EDUCATIONS => drop(self.educations.remove(index)),
            PROJECTS => drop(self.projects.remove(index)),
            _ => drop(self.skills.remove(index)),
        }
        Ok(())
    }

    pub fn move_entry(&mut self, section: &str, from: usize, to: usize) -> Result<(), FieldError> {
        let count = self.entry_count(section)?;
        if from >= count || to >= count {
            return Err(FieldError::OutOfRange(FieldKey::entry(section, "*", from.max(to))));
        }
        match section {
            WORK_EXPERIENCES => move_item(&mut self.work_experiences, from, to),
            EDUCATIONS => move_item(&mut self.educations, from, to),
            PROJECTS => move_item(&mut self.projects, from, to),
            _ => move_item(&mut self.skills, from, to),
        }
        Ok(())
    }

    /// Appends a project to a work experience and returns its position.
    pub fn add_project(&mut self, experience: usize) -> Result<usize, FieldError> {
        let exp = self
            .work_experiences
            .get_mut(experience)
            .ok_or_else(|| FieldError::OutOfRange(FieldKey::entry(WORK_EXPERIENCES, "project_name", experience)))?;
        exp.projects.push(Project::new("", &[]));
        Ok(exp.projects.len() - 1)
    }

    /// Removes a project and returns the number of bullets it held.
    pub fn remove_project(&mut self, experience: usize, project: usize) -> Result<usize, FieldError> {
        let key = FieldKey::element(WORK_EXPERIENCES, "project_name", experience, project);
        let exp = self
            .work_experiences
            .get_mut(experience)
            .ok_or_else(|| FieldError::OutOfRange(key.clone()))?;
        if project >= exp.projects.len() {
            return Err(FieldError::OutOfRange(key));
        }
        Ok(exp.projects.remove(project).bullets.len())
    }

    /// Appends an empty element to an array field and returns its key.
    ///
    /// `project` picks the work-experience project that receives a new bullet
    /// (defaults to the last one, created if the experience has none).
    pub fn add_element(
        &mut self,
        section: &str,
        field: &str,
        index: usize,
        project: Option<usize>,
    ) -> Result<FieldKey, FieldError> {
        let first_key = FieldKey::element(section, field, index, 0);
        validate_key(&first_key)?;
        let oob = || FieldError::OutOfRange(first_key.clone());

        let sub_index = match (section, field) {
            (WORK_EXPERIENCES, "bullet") => {
                let exp = self.work_experiences.get_mut(index).ok_or_else(oob)?;
                if exp.projects.is_empty() {
                    exp.projects.push(Project::new("", &[]));
                }
                let p = project.unwrap_or(exp.projects.len() - 1);
                if p >= exp.projects.len() {
                    return Err(oob());
                }
                let ordinal = exp.bullet_offset(p) + exp.projects[p].bullets.len();
                exp.projects[p].bullets.push(String::new());
                ordinal
            }
            (WORK_EXPERIENCES, _) => return self.add_project(index).map(|p| FieldKey::element(section, field, index, p)),
            (EDUCATIONS, _) => push_blank(&mut self.educations.get_mut(index).ok_or_else(oob)?.details),
            (PROJECTS, _) => push_blank(&mut self.projects.get_mut(index).ok_or_else(oob)?.bullets),
            _ => push_blank(&mut self.skills.get_mut(index).ok_or_else(oob)?.items),
        };
        Ok(FieldKey::element(section, field, index, sub_index))
    }

    /// Removes the array element addressed by `key` and returns its text.
    pub fn remove_element(&mut self, key: &FieldKey) -> Result<String, FieldError> {
        if validate_key(key)? != FieldShape::EntryElement || key.field == "project_name" {
            return Err(FieldError::UnknownField {
                section: key.section.clone(),
                field: key.field.clone(),
            });
        }
        let oob = || FieldError::OutOfRange(key.clone());
        let index = key.index.unwrap_or_default();
        let sub = key.sub_index.unwrap_or_default();

        let list = match key.section.as_str() {
            WORK_EXPERIENCES => {
                let exp = self.work_experiences.get_mut(index).ok_or_else(oob)?;
                let (p, b) = exp.locate_bullet(sub).ok_or_else(oob)?;
                return Ok(exp.projects[p].bullets.remove(b));
            }
            EDUCATIONS => &mut self.educations.get_mut(index).ok_or_else(oob)?.details,
            PROJECTS => &mut self.projects.get_mut(index).ok_or_else(oob)?.bullets,
            _ => &mut self.skills.get_mut(index).ok_or_else(oob)?.items,
        };
        if sub >= list.len() {
            return Err(oob());
        }
        Ok(list.remove(sub))
    }

    /// Every addressable leaf, in render order.
    pub fn field_keys(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = PERSONAL_FIELDS
            .iter()
            .map(|f| FieldKey::scalar(PERSONAL_INFO, f))
            .collect();

        for (i, exp) in self.work_experiences.iter().enumerate() {
            keys.extend(WORK_FIELDS.iter().map(|f| FieldKey::entry(WORK_EXPERIENCES, f, i)));
            let mut ordinal = 0;
            for (p, project) in exp.projects.iter().enumerate() {
                keys.push(FieldKey::element(WORK_EXPERIENCES, "project_name", i, p));
                for _ in &project.bullets {
                    keys.push(FieldKey::element(WORK_EXPERIENCES, "bullet", i, ordinal));
                    ordinal += 1;
                }
            }
        }
        for (i, edu) in self.educations.iter().enumerate() {
            keys.extend(EDUCATION_FIELDS.iter().map(|f| FieldKey::entry(EDUCATIONS, f, i)));
            keys.extend((0..edu.details.len()).map(|d| FieldKey::element(EDUCATIONS, "detail", i, d)));
        }
        for (i, project) in self.projects.iter().enumerate() {
            keys.extend(PROJECT_FIELDS.iter().map(|f| FieldKey::entry(PROJECTS, f, i)));
            keys.extend((0..project.bullets.len()).map(|b| FieldKey::element(PROJECTS, "bullet", i, b)));
        }
        for (i, group) in self.skills.iter().enumerate() {
            keys.push(FieldKey::entry(SKILLS, "category", i));
            keys.extend((0..group.items.len()).map(|s| FieldKey::element(SKILLS, "item", i, s)));
        }
        keys
    }

    /// Starter document used when the editor opens without a saved resume.
    pub fn default_document() -> Self {
        Resume {
            personal_info: PersonalInfo {
                name: "Jordan Rivera".to_string(),
                title: "Senior Software Engineer".to_string(),
                email: "jordan@example.com".to_string(),
                phone: "+1 555 0100".to_string(),
                location: "Portland, OR".to_string(),
                website: "jordanrivera.dev".to_string(),
                summary: "Backend engineer focused on reliable data pipelines and developer tooling."
                    .to_string(),
            },
            work_experiences: vec![WorkExperience {
                id: Uuid::new_v4(),
                company: "Acme Corp".to_string(),
                job_title: "Staff Engineer".to_string(),
                location: "Remote".to_string(),
                start_date: "2019".to_string(),
                end_date: "Present".to_string(),
                projects: vec![Project::new(
                    "Billing Platform",
                    &[
                        "Rebuilt the invoicing pipeline in Rust, cutting batch time by 60%",
                        "Led a team of four engineers across two time zones",
                        "Mentored junior developers over five years of platform growth",
                    ],
                )],
            }],
            educations: vec![Education {
                id: Uuid::new_v4(),
                school: "State University".to_string(),
                degree: "B.S.".to_string(),
                field_of_study: "Computer Science".to_string(),
                start_date: "2011".to_string(),
                end_date: "2015".to_string(),
                details: vec!["Graduated with honors".to_string()],
            }],
            projects: vec![SideProject {
                id: Uuid::new_v4(),
                name: "tinykv".to_string(),
                link: "github.com/jordan/tinykv".to_string(),
                bullets: vec!["Embedded key-value store with a write-ahead log".to_string()],
            }],
            skills: vec![SkillGroup {
                id: Uuid::new_v4(),
                category: "Languages".to_string(),
                items: vec!["Rust".to_string(), "Go".to_string(), "SQL".to_string()],
            }],
        }
    }
}

fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    let item = items.remove(from);
    items.insert(to, item);
}

fn push_blank(items: &mut Vec<String>) -> usize {
    items.push(String::new());
    items.len() - 1
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
