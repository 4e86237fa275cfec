use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_id, Id};

/// Shared title/introduction/curriculum-area text applied to many reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub curriculum_area: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateScope {
    School { organization_id: Id },
    Classroom { organization_id: Id, classroom_id: Id },
}

impl TemplateScope {
    pub fn organization_id(&self) -> &str {
        match self {
            TemplateScope::School { organization_id } => organization_id,
            TemplateScope::Classroom {
                organization_id, ..
            } => organization_id,
        }
    }

    /// Empty for school scope.
    pub fn classroom_id(&self) -> &str {
        match self {
            TemplateScope::School { .. } => "",
            TemplateScope::Classroom { classroom_id, .. } => classroom_id,
        }
    }

    pub fn is_school(&self) -> bool {
        matches!(self, TemplateScope::School { .. })
    }
}

/// Upsert key of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    pub scope: TemplateScope,
    pub topic_id: Id,
    pub term_id: Id,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPlanTemplate {
    pub id: Id,
    #[serde(flatten)]
    pub key: TemplateKey,
    pub content: TemplateContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportPlanTemplate {
    pub fn new(key: TemplateKey, content: TemplateContent, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            key,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}
