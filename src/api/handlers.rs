use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ReportError;
use crate::logic::{
    ApplyClassroomTemplateRequest, ApplyTemplateRequest, ClassroomReportsQuery, MergeOutcome,
    ReportOrchestrator, TeacherReportQuery, TemplateApplication, UploadClassroomReportRequest,
    UploadPlanTemplateRequest, UploadReportRequest,
};
use crate::model::{
    ClassroomOverview, ClassroomReports, OpenTask, ReportHistory, ReportIdentity,
    ReportPlanTemplate, ReportView, Role, SchoolOverview, UserContext,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<ReportOrchestrator<S>>;

type HandlerResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub role: Role,
}

pub fn status_for(err: &ReportError) -> StatusCode {
    match err {
        ReportError::NotFound(_) => StatusCode::NOT_FOUND,
        ReportError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportError::Forbidden(_) => StatusCode::FORBIDDEN,
        ReportError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ReportError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ReportError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        log::error!("Request failed: {:#}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

pub async fn upload_teacher_report<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<UploadReportRequest>,
) -> HandlerResult<MergeOutcome> {
    orchestrator
        .upload_teacher_report(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn upload_manager_report<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<UploadReportRequest>,
) -> HandlerResult<MergeOutcome> {
    orchestrator
        .upload_manager_report(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn upload_classroom_report<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<UploadClassroomReportRequest>,
) -> HandlerResult<MergeOutcome> {
    orchestrator
        .upload_classroom_report(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_report<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    Path((student_id, topic_id, term_id, language)): Path<(String, String, String, String)>,
) -> HandlerResult<ReportView> {
    let identity = ReportIdentity::new(student_id, topic_id, term_id, language);
    orchestrator
        .get_report(&identity)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_teacher_report<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    Query(query): Query<TeacherReportQuery>,
) -> HandlerResult<ReportView> {
    orchestrator
        .get_teacher_report(&user, &query)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_classroom_reports<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    Query(query): Query<ClassroomReportsQuery>,
) -> HandlerResult<ClassroomReports> {
    orchestrator
        .get_classroom_reports(&user, &query)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn teacher_tasks<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
) -> HandlerResult<ListResponse<OpenTask>> {
    orchestrator
        .teacher_tasks(&user)
        .await
        .map(|tasks| Json(tasks.into()))
        .map_err(error_response)
}

pub async fn editor_histories<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    Path(editor_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> HandlerResult<ListResponse<ReportHistory>> {
    orchestrator
        .editor_histories(&editor_id, query.role)
        .await
        .map(|histories| Json(histories.into()))
        .map_err(error_response)
}

pub async fn school_overview<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    Path(term_id): Path<String>,
) -> HandlerResult<SchoolOverview> {
    orchestrator
        .school_overview(&term_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn classroom_overview<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    Path((term_id, classroom_id)): Path<(String, String)>,
) -> HandlerResult<ClassroomOverview> {
    orchestrator
        .classroom_overview(&term_id, &classroom_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn upload_plan_template<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<UploadPlanTemplateRequest>,
) -> HandlerResult<ReportPlanTemplate> {
    orchestrator
        .upload_plan_template(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn apply_school_template<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<ApplyTemplateRequest>,
) -> HandlerResult<TemplateApplication> {
    orchestrator
        .apply_school_template(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn apply_classroom_template<S: Store + 'static>(
    State(orchestrator): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<ApplyClassroomTemplateRequest>,
) -> HandlerResult<TemplateApplication> {
    orchestrator
        .apply_classroom_template(&user, request)
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_status_codes() {
        assert_eq!(
            status_for(&ReportError::not_found("report")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ReportError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ReportError::Forbidden("no".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ReportError::UpstreamUnavailable("users".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ReportError::from(anyhow::anyhow!("pool closed"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
