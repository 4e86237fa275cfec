use serde::{Deserialize, Serialize};

use crate::model::{Id, Report, ReportIdentity};

/// Equality filter over report attributes; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<Id>,
}

impl ReportFilter {
    pub fn identity(identity: &ReportIdentity) -> Self {
        Self {
            student_id: Some(identity.student_id.clone()),
            topic_id: Some(identity.topic_id.clone()),
            term_id: Some(identity.term_id.clone()),
            language: Some(identity.language.clone()),
            editor_id: None,
        }
    }

    pub fn identity_and_editor(identity: &ReportIdentity, editor_id: &str) -> Self {
        Self {
            editor_id: Some(editor_id.to_string()),
            ..Self::identity(identity)
        }
    }

    pub fn by_editor(editor_id: &str) -> Self {
        Self {
            editor_id: Some(editor_id.to_string()),
            ..Self::default()
        }
    }

    pub fn term_topic_language(term_id: &str, topic_id: &str, language: &str) -> Self {
        Self {
            term_id: Some(term_id.to_string()),
            topic_id: Some(topic_id.to_string()),
            language: Some(language.to_string()),
            ..Self::default()
        }
    }

    pub fn editor_student_term(editor_id: &str, student_id: &str, term_id: &str) -> Self {
        Self {
            editor_id: Some(editor_id.to_string()),
            student_id: Some(student_id.to_string()),
            term_id: Some(term_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        fn check(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |want| want == have)
        }
        check(&self.student_id, &report.identity.student_id)
            && check(&self.topic_id, &report.identity.topic_id)
            && check(&self.term_id, &report.identity.term_id)
            && check(&self.language, &report.identity.language)
            && check(&self.editor_id, &report.editor_id)
    }
}
