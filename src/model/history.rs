use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_id, Id, Report, Role};

/// Which surface produced an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditType {
    AppStudentView,
    WebStudentView,
    WebClassroomView,
}

impl EditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditType::AppStudentView => "app-student-view",
            EditType::WebStudentView => "web-student-view",
            EditType::WebClassroomView => "web-classroom-view",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "app-student-view" => Some(EditType::AppStudentView),
            "web-student-view" => Some(EditType::WebStudentView),
            "web-classroom-view" => Some(EditType::WebClassroomView),
            _ => None,
        }
    }
}

/// Immutable audit entry: the report as it stood right after one merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHistory {
    pub id: Id,
    pub report_id: Id,
    pub editor_id: String,
    pub editor_role: Role,
    pub edit_type: EditType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Id>,
    pub report: Report,
    pub recorded_at: DateTime<Utc>,
}

impl ReportHistory {
    pub fn new(
        report: Report,
        editor_id: String,
        editor_role: Role,
        edit_type: EditType,
        classroom_id: Option<Id>,
    ) -> Self {
        Self {
            id: generate_id(),
            report_id: report.id.clone(),
            editor_id,
            editor_role,
            edit_type,
            classroom_id,
            report,
            recorded_at: Utc::now(),
        }
    }
}
