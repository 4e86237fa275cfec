use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ReportError;
use crate::model::{generate_id, FieldSet, Id};

/// The unique key of a report: one document per student, topic, term and language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportIdentity {
    pub student_id: Id,
    pub topic_id: Id,
    pub term_id: Id,
    pub language: String,
}

impl ReportIdentity {
    pub fn new(
        student_id: impl Into<String>,
        topic_id: impl Into<String>,
        term_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            topic_id: topic_id.into(),
            term_id: term_id.into(),
            language: language.into(),
        }
    }

    /// Every component of the identity tuple must be present.
    pub fn validate(&self) -> Result<(), ReportError> {
        let missing: Vec<&str> = [
            ("student_id", &self.student_id),
            ("topic_id", &self.topic_id),
            ("term_id", &self.term_id),
            ("language", &self.language),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReportError::validation(format!(
                "missing identity components: {}",
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Display for ReportIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.student_id, self.topic_id, self.term_id, self.language
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    Title,
    Goal,
    CurriculumArea,
    SubTitle,
    Before,
    Now,
    Conclusion,
    Introduction,
    Note,
}

impl SectionName {
    pub const ALL: [SectionName; 9] = [
        SectionName::Title,
        SectionName::Goal,
        SectionName::CurriculumArea,
        SectionName::SubTitle,
        SectionName::Before,
        SectionName::Now,
        SectionName::Conclusion,
        SectionName::Introduction,
        SectionName::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Title => "title",
            SectionName::Goal => "goal",
            SectionName::CurriculumArea => "curriculum_area",
            SectionName::SubTitle => "sub_title",
            SectionName::Before => "before",
            SectionName::Now => "now",
            SectionName::Conclusion => "conclusion",
            SectionName::Introduction => "introduction",
            SectionName::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == value)
    }

    /// Static sections only carry `content` and `updated_at` and are never written by
    /// role-scoped merges.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            SectionName::Title
                | SectionName::Goal
                | SectionName::CurriculumArea
                | SectionName::SubTitle
        )
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may write a section field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwner {
    Teacher,
    Manager,
    /// `status` is written by both roles; the last merge wins.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionField {
    Content,
    TeacherReport,
    Color,
    Status,
    NoteForTeacher,
    UpdatedAt,
    ManagerNote,
    ManagerComment,
    ManagerUpdatedAt,
}

impl SectionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionField::Content => "content",
            SectionField::TeacherReport => "teacher_report",
            SectionField::Color => "color",
            SectionField::Status => "status",
            SectionField::NoteForTeacher => "note_for_teacher",
            SectionField::UpdatedAt => "updated_at",
            SectionField::ManagerNote => "manager_note",
            SectionField::ManagerComment => "manager_comment",
            SectionField::ManagerUpdatedAt => "manager_updated_at",
        }
    }

    pub fn owner(&self) -> FieldOwner {
        match self {
            SectionField::ManagerNote
            | SectionField::ManagerComment
            | SectionField::ManagerUpdatedAt => FieldOwner::Manager,
            SectionField::Status => FieldOwner::Shared,
            _ => FieldOwner::Teacher,
        }
    }
}

impl fmt::Display for SectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NarrativeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_for_teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_updated_at: Option<String>,
}

/// One section of a report. The shape is decided by the section name, not by the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section {
    Static(StaticSection),
    Narrative(NarrativeSection),
}

impl Section {
    pub fn empty_for(name: SectionName) -> Self {
        if name.is_static() {
            Section::Static(StaticSection::default())
        } else {
            Section::Narrative(NarrativeSection::default())
        }
    }

    fn slot(&self, field: SectionField) -> Option<&Option<String>> {
        match self {
            Section::Static(s) => match field {
                SectionField::Content => Some(&s.content),
                SectionField::UpdatedAt => Some(&s.updated_at),
                _ => None,
            },
            Section::Narrative(n) => Some(match field {
                SectionField::Content => &n.content,
                SectionField::TeacherReport => &n.teacher_report,
                SectionField::Color => &n.color,
                SectionField::Status => &n.status,
                SectionField::NoteForTeacher => &n.note_for_teacher,
                SectionField::UpdatedAt => &n.updated_at,
                SectionField::ManagerNote => &n.manager_note,
                SectionField::ManagerComment => &n.manager_comment,
                SectionField::ManagerUpdatedAt => &n.manager_updated_at,
            }),
        }
    }

    fn slot_mut(&mut self, field: SectionField) -> Option<&mut Option<String>> {
        match self {
            Section::Static(s) => match field {
                SectionField::Content => Some(&mut s.content),
                SectionField::UpdatedAt => Some(&mut s.updated_at),
                _ => None,
            },
            Section::Narrative(n) => Some(match field {
                SectionField::Content => &mut n.content,
                SectionField::TeacherReport => &mut n.teacher_report,
                SectionField::Color => &mut n.color,
                SectionField::Status => &mut n.status,
                SectionField::NoteForTeacher => &mut n.note_for_teacher,
                SectionField::UpdatedAt => &mut n.updated_at,
                SectionField::ManagerNote => &mut n.manager_note,
                SectionField::ManagerComment => &mut n.manager_comment,
                SectionField::ManagerUpdatedAt => &mut n.manager_updated_at,
            }),
        }
    }

    pub fn get(&self, field: SectionField) -> Option<&str> {
        self.slot(field).and_then(|value| value.as_deref())
    }

    /// Writes a single field. Returns false when the field does not exist on this shape.
    pub fn set(&mut self, field: SectionField, value: String) -> bool {
        match self.slot_mut(field) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Fields that hold a value, in declaration order.
    pub fn present_fields(&self) -> Vec<(SectionField, &str)> {
        const ORDER: [SectionField; 9] = [
            SectionField::Content,
            SectionField::TeacherReport,
            SectionField::Color,
            SectionField::Status,
            SectionField::NoteForTeacher,
            SectionField::UpdatedAt,
            SectionField::ManagerNote,
            SectionField::ManagerComment,
            SectionField::ManagerUpdatedAt,
        ];
        ORDER
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
            .collect()
    }

    pub fn status(&self) -> Option<&str> {
        self.get(SectionField::Status)
    }
}

/// Raised when a section map does not match the known section shapes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid sections: {0}")]
pub struct InvalidSections(pub String);

impl From<InvalidSections> for ReportError {
    fn from(err: InvalidSections) -> Self {
        ReportError::Validation(err.0)
    }
}

/// The section map of a report (or of a partial update).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct Sections(BTreeMap<SectionName, Section>);

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an untyped section map, rejecting unknown sections and fields.
    pub fn from_json(value: serde_json::Value) -> Result<Self, InvalidSections> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_value(value)
            .map_err(|e| InvalidSections(format!("section map must be an object: {}", e)))?;
        Self::try_from(raw)
    }

    pub fn get(&self, name: SectionName) -> Option<&Section> {
        self.0.get(&name)
    }

    pub fn insert(&mut self, name: SectionName, section: Section) -> Option<Section> {
        self.0.insert(name, section)
    }

    pub fn entry(&mut self, name: SectionName) -> &mut Section {
        self.0
            .entry(name)
            .or_insert_with(|| Section::empty_for(name))
    }

    /// Builder-style single field write, used to assemble partial updates.
    pub fn with(mut self, name: SectionName, field: SectionField, value: impl Into<String>) -> Self {
        self.entry(name).set(field, value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionName, &Section)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: SectionName, field: SectionField) -> Option<&str> {
        self.get(name).and_then(|section| section.get(field))
    }

    pub fn status_of(&self, name: SectionName) -> Option<&str> {
        self.field(name, SectionField::Status)
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for Sections {
    type Error = InvalidSections;

    fn try_from(raw: BTreeMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut sections = BTreeMap::new();
        for (key, value) in raw {
            let name = SectionName::parse(&key)
                .ok_or_else(|| InvalidSections(format!("unknown section `{}`", key)))?;
            if value.is_null() {
                continue;
            }
            let section = if name.is_static() {
                serde_json::from_value::<StaticSection>(value).map(Section::Static)
            } else {
                serde_json::from_value::<NarrativeSection>(value).map(Section::Narrative)
            }
            .map_err(|e| InvalidSections(format!("section `{}`: {}", key, e)))?;
            sections.insert(name, section);
        }
        Ok(Sections(sections))
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Id,
    #[serde(flatten)]
    pub identity: ReportIdentity,
    #[serde(default)]
    pub editor_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default = "default_editing")]
    pub editing: bool,
    #[serde(default)]
    pub sections: Sections,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_editing() -> bool {
    true
}

impl Report {
    pub fn new(identity: ReportIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            identity,
            editor_id: String::new(),
            status: String::new(),
            editing: true,
            sections: Sections::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a set of field assignments in place. Fields not named by the set are untouched.
    pub fn apply(&mut self, fields: &FieldSet) {
        if let Some(editor_id) = &fields.editor_id {
            self.editor_id = editor_id.clone();
        }
        if let Some(status) = &fields.status {
            self.status = status.clone();
        }
        if let Some(editing) = fields.editing {
            self.editing = editing;
        }
        if let Some(updated_at) = fields.updated_at {
            self.updated_at = updated_at;
        }
        for (section, field, value) in fields.assignments() {
            let written = self.sections.entry(section).set(field, value.to_string());
            debug_assert!(written, "{}.{} does not exist on this section shape", section, field);
        }
    }
}
