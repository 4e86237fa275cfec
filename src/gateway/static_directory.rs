use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gateway::traits::{ClassroomDirectory, TermDirectory, TopicDirectory, UserDirectory};
use crate::model::{
    ClassroomRoster, CurrentUser, Id, StudentInfo, TeacherInfo, Term, Topic, UserAccount,
    UserContext,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    #[serde(flatten)]
    pub term: Term,
    /// Restricts the entry to one organization when set
    #[serde(default)]
    pub organization_id: Option<Id>,
    #[serde(default)]
    pub previous_term_id: Option<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassroomEntry {
    pub term_id: Id,
    #[serde(flatten)]
    pub roster: ClassroomRoster,
}

/// Directory contents as read from a JSON fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryFixture {
    pub students: Vec<StudentInfo>,
    pub teachers: Vec<TeacherInfo>,
    pub users: Vec<CurrentUser>,
    pub terms: Vec<TermEntry>,
    pub topics: Vec<Topic>,
    pub classrooms: Vec<ClassroomEntry>,
}

/// Serves every directory lookup from an in-process fixture.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    fixture: DirectoryFixture,
}

impl StaticDirectory {
    pub fn new(fixture: DirectoryFixture) -> Self {
        Self { fixture }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory fixture {}", path.display()))?;
        let fixture: DirectoryFixture = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse directory fixture {}", path.display()))?;
        log::info!(
            "Loaded directory fixture: {} students, {} teachers, {} classrooms",
            fixture.students.len(),
            fixture.teachers.len(),
            fixture.classrooms.len()
        );
        Ok(Self::new(fixture))
    }

    fn term_entry(&self, term_id: &str, organization_id: &str) -> Option<&TermEntry> {
        self.fixture.terms.iter().find(|entry| {
            entry.term.id == term_id
                && entry
                    .organization_id
                    .as_deref()
                    .map_or(true, |org| org == organization_id)
        })
    }
}

#[async_trait::async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_student_info(&self, student_id: &str) -> Result<Option<StudentInfo>> {
        Ok(self
            .fixture
            .students
            .iter()
            .find(|s| s.id == student_id)
            .cloned())
    }

    async fn get_teacher_info(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Option<TeacherInfo>> {
        Ok(self
            .fixture
            .teachers
            .iter()
            .find(|t| t.user_id == user_id && t.organization_id == organization_id)
            .cloned())
    }

    async fn get_current_user(&self, ctx: &UserContext) -> Result<Option<CurrentUser>> {
        Ok(self
            .fixture
            .users
            .iter()
            .find(|u| u.id == ctx.user_id)
            .cloned())
    }

    async fn get_user_by_teacher(&self, teacher_id: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .fixture
            .teachers
            .iter()
            .find(|t| t.id == teacher_id)
            .map(|t| UserAccount {
                id: t.user_id.clone(),
                name: t.name.clone(),
            }))
    }
}

#[async_trait::async_trait]
impl TermDirectory for StaticDirectory {
    async fn get_term_by_id(&self, term_id: &str) -> Result<Option<Term>> {
        Ok(self
            .fixture
            .terms
            .iter()
            .find(|entry| entry.term.id == term_id)
            .map(|entry| entry.term.clone()))
    }

    async fn get_previous_term(
        &self,
        term_id: &str,
        organization_id: &str,
    ) -> Result<Option<Term>> {
        let Some(previous_id) = self
            .term_entry(term_id, organization_id)
            .and_then(|entry| entry.previous_term_id.as_deref())
        else {
            return Ok(None);
        };
        Ok(self
            .term_entry(previous_id, organization_id)
            .map(|entry| entry.term.clone()))
    }
}

#[async_trait::async_trait]
impl TopicDirectory for StaticDirectory {
    async fn get_topic_by_id(&self, topic_id: &str) -> Result<Option<Topic>> {
        Ok(self
            .fixture
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .cloned())
    }
}

#[async_trait::async_trait]
impl ClassroomDirectory for StaticDirectory {
    async fn get_assigned_students(
        &self,
        term_id: &str,
        classroom_id: &str,
    ) -> Result<Option<ClassroomRoster>> {
        Ok(self
            .fixture
            .classrooms
            .iter()
            .find(|c| c.term_id == term_id && c.roster.classroom_id == classroom_id)
            .map(|c| c.roster.clone()))
    }

    async fn list_classrooms(&self, term_id: &str) -> Result<Vec<ClassroomRoster>> {
        Ok(self
            .fixture
            .classrooms
            .iter()
            .filter(|c| c.term_id == term_id)
            .map(|c| c.roster.clone())
            .collect())
    }
}
