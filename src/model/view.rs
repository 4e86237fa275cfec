use serde::{Deserialize, Serialize};

use crate::model::{
    ManagerPrevious, Report, ReportSummary, TeacherInfo, TeacherPrevious, TemplateContent,
};

/// A report as shown to a reader: the document plus derived context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub report: Report,
    pub progress: u32,
    #[serde(default)]
    pub editor: Option<TeacherInfo>,
    pub manager_previous_term: ManagerPrevious,
    pub teacher_previous_term: TeacherPrevious,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomStudentReport {
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub view: ReportView,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassroomReports {
    pub school_template: TemplateContent,
    pub classroom_template: TemplateContent,
    pub reports: Vec<ClassroomStudentReport>,
    pub summary: ReportSummary,
}
