use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Report uploads, one per editing surface
        .route("/reports/teacher", post(handlers::upload_teacher_report::<S>))
        .route("/reports/manager", post(handlers::upload_manager_report::<S>))
        .route(
            "/reports/classroom",
            get(handlers::get_classroom_reports::<S>).post(handlers::upload_classroom_report::<S>),
        )
        // Report reads
        .route(
            "/reports/identity/:student_id/:topic_id/:term_id/:language",
            get(handlers::get_report::<S>),
        )
        .route("/reports/teacher-view", get(handlers::get_teacher_report::<S>))
        .route("/reports/tasks", get(handlers::teacher_tasks::<S>))
        .route(
            "/reports/histories/:editor_id",
            get(handlers::editor_histories::<S>),
        )
        // Progress overviews
        .route("/overview/:term_id", get(handlers::school_overview::<S>))
        .route(
            "/overview/:term_id/classrooms/:classroom_id",
            get(handlers::classroom_overview::<S>),
        )
        // Plan templates
        .route("/templates", post(handlers::upload_plan_template::<S>))
        .route("/templates/school", post(handlers::apply_school_template::<S>))
        .route(
            "/templates/classroom",
            post(handlers::apply_classroom_template::<S>),
        )
}
