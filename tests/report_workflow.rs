use chrono::Utc;
use progress_report_engine::gateway::{DirectoryFixture, Gateways, StaticDirectory};
use progress_report_engine::logic::{
    ApplyClassroomTemplateRequest, ApplyTemplateRequest, ClassroomReportsQuery, ReportOrchestrator,
    UploadClassroomReportRequest, UploadPlanTemplateRequest, UploadReportRequest,
};
use progress_report_engine::model::{
    Report, ReportIdentity, Role, SectionField, SectionName, Sections, UserContext,
};
use progress_report_engine::store::{InMemoryStore, ReportStore};
use progress_report_engine::ReportError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn fixture() -> DirectoryFixture {
    serde_json::from_value(json!({
        "students": [
            {"id": "s1", "organization_id": "org", "name": "Mai"},
            {"id": "s2", "organization_id": "org", "name": "Binh"}
        ],
        "teachers": [
            {"id": "tch1", "user_id": "u1", "organization_id": "org", "name": "Lan"}
        ],
        "users": [
            {"id": "u1"},
            {"id": "admin", "organization_id": "org"},
            {"id": "root", "is_super_admin": true}
        ],
        "terms": [
            {"id": "autumn", "title": "Autumn 2024"},
            {"id": "spring", "title": "Spring 2025", "previous_term_id": "autumn"}
        ],
        "topics": [
            {"id": "t1", "title": "Shapes", "main_image_url": "shapes.png"}
        ],
        "classrooms": [{
            "term_id": "spring",
            "classroom_id": "c1",
            "classroom_name": "Sunflowers",
            "students": [
                {"student_id": "s1", "student_name": "Mai", "organization_id": "org", "teacher_id": "tch1"},
                {"student_id": "s2", "student_name": "Binh", "organization_id": "org", "teacher_id": "tch1"}
            ]
        }]
    }))
    .unwrap()
}

fn setup() -> ReportOrchestrator<InMemoryStore> {
    let gateways = Gateways::from_directory(
        Arc::new(StaticDirectory::new(fixture())),
        Duration::from_secs(1),
    );
    ReportOrchestrator::new(Arc::new(InMemoryStore::new()), gateways)
}

fn upload(sections: Value) -> UploadReportRequest {
    serde_json::from_value(json!({
        "student_id": "s1",
        "topic_id": "t1",
        "term_id": "spring",
        "language": "en",
        "sections": sections
    }))
    .unwrap()
}

fn identity() -> ReportIdentity {
    ReportIdentity::new("s1", "t1", "spring", "en")
}

async fn teacher_draft(orchestrator: &ReportOrchestrator<InMemoryStore>) {
    orchestrator
        .upload_teacher_report(
            &UserContext::new("u1"),
            upload(json!({
                "before": {"teacher_report": "Counts to five", "status": "teacher"},
                "now": {"status": "empty"}
            })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_teacher_then_manager_keep_each_others_fields() {
    let orchestrator = setup();

    let outcome = orchestrator
        .upload_teacher_report(
            &UserContext::new("u1"),
            upload(json!({
                "before": {"teacher_report": "Counts to five", "status": "teacher"},
                "now": {"status": "empty"}
            })),
        )
        .await
        .unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.report.editor_id, "u1");

    let view = orchestrator.get_report(&identity()).await.unwrap();
    assert_eq!(view.progress, 10);
    assert_eq!(view.editor.map(|t| t.name), Some("Lan".to_string()));

    let outcome = orchestrator
        .upload_manager_report(
            &UserContext::new("admin"),
            upload(json!({
                "before": {"manager_comment": "Well done", "status": "manager"}
            })),
        )
        .await
        .unwrap();
    assert!(!outcome.created);
    // The manager path never takes over the report
    assert_eq!(outcome.report.editor_id, "u1");

    let view = orchestrator.get_report(&identity()).await.unwrap();
    let sections = &view.report.sections;
    assert_eq!(
        sections.field(SectionName::Before, SectionField::TeacherReport),
        Some("Counts to five")
    );
    assert_eq!(
        sections.field(SectionName::Before, SectionField::ManagerComment),
        Some("Well done")
    );
    assert_eq!(view.progress, 15);

    assert_eq!(orchestrator.store().report_count(), 1);
    assert_eq!(orchestrator.store().history_count(), 2);

    let histories = orchestrator.editor_histories("admin", Role::Manager).await.unwrap();
    assert_eq!(histories.len(), 1);
    assert_eq!(histories[0].report.id, view.report.id);
}

#[tokio::test]
async fn test_draft_then_review_on_now_section() {
    let orchestrator = setup();

    orchestrator
        .upload_teacher_report(
            &UserContext::new("u1"),
            upload(json!({"now": {"teacher_report": "draft", "status": "teacher"}})),
        )
        .await
        .unwrap();
    assert_eq!(orchestrator.get_report(&identity()).await.unwrap().progress, 10);

    orchestrator
        .upload_manager_report(
            &UserContext::new("admin"),
            upload(json!({"now": {"manager_comment": "looks good", "status": "manager"}})),
        )
        .await
        .unwrap();

    let view = orchestrator.get_report(&identity()).await.unwrap();
    let now = view.report.sections.get(SectionName::Now).unwrap();
    assert_eq!(now.get(SectionField::TeacherReport), Some("draft"));
    assert_eq!(now.get(SectionField::ManagerComment), Some("looks good"));
    assert_eq!(now.get(SectionField::Status), Some("manager"));
    assert_eq!(view.progress, 15);
}

#[tokio::test]
async fn test_manager_cannot_create_reports() {
    let orchestrator = setup();

    let err = orchestrator
        .upload_manager_report(
            &UserContext::new("admin"),
            upload(json!({"now": {"manager_comment": "Hello"}})),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(orchestrator.store().report_count(), 0);
    assert_eq!(orchestrator.store().history_count(), 0);
}

#[tokio::test]
async fn test_upload_requires_a_teacher_in_the_students_organization() {
    let orchestrator = setup();

    let err = orchestrator
        .upload_teacher_report(&UserContext::new("admin"), upload(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Forbidden(_)));

    let err = orchestrator
        .upload_teacher_report(&UserContext::new(""), upload(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Forbidden(_)));
}

#[tokio::test]
async fn test_classroom_review_targets_the_teachers_report() {
    let orchestrator = setup();
    teacher_draft(&orchestrator).await;

    let request: UploadClassroomReportRequest = serde_json::from_value(json!({
        "student_id": "s1",
        "topic_id": "t1",
        "term_id": "spring",
        "language": "en",
        "classroom_id": "c1",
        "teacher_id": "tch1",
        "sections": {"now": {"manager_note": "Check shapes homework"}}
    }))
    .unwrap();
    let outcome = orchestrator
        .upload_classroom_report(&UserContext::new("admin"), request)
        .await
        .unwrap();
    assert_eq!(
        outcome
            .report
            .sections
            .field(SectionName::Now, SectionField::ManagerNote),
        Some("Check shapes homework")
    );

    let histories = orchestrator.editor_histories("admin", Role::Manager).await.unwrap();
    assert_eq!(histories[0].classroom_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_previous_term_comments_are_carried_forward() {
    let orchestrator = setup();

    let mut previous = Report::new(
        ReportIdentity::new("s1", "t1", "autumn", "en"),
        Utc::now(),
    );
    previous.editor_id = "u1".to_string();
    previous.sections = Sections::new()
        .with(SectionName::Now, SectionField::TeacherReport, "Sorting colours")
        .with(SectionName::Conclusion, SectionField::ManagerComment, "Ready for shapes")
        .with(SectionName::Before, SectionField::TeacherReport, "not carried");
    orchestrator.store().put_report(previous);

    teacher_draft(&orchestrator).await;

    let view = orchestrator.get_report(&identity()).await.unwrap();
    assert_eq!(view.teacher_previous_term.term_title, "Autumn 2024");
    assert_eq!(view.teacher_previous_term.now, "Sorting colours");
    assert_eq!(view.manager_previous_term.conclusion, "Ready for shapes");
    assert_eq!(view.manager_previous_term.now, "");
}

#[tokio::test]
async fn test_templates_update_existing_reports_only() {
    let orchestrator = setup();
    teacher_draft(&orchestrator).await;

    let request: ApplyClassroomTemplateRequest = serde_json::from_value(json!({
        "term_id": "spring",
        "topic_id": "t1",
        "language": "en",
        "classroom_id": "c1",
        "title": "Shapes around us",
        "introduction": "We look for shapes at school",
        "curriculum_area": "Maths"
    }))
    .unwrap();
    let applied = orchestrator
        .apply_classroom_template(&UserContext::new("admin"), request)
        .await
        .unwrap();
    // s2 has no report yet
    assert_eq!(applied.updated, 1);
    assert_eq!(applied.skipped, 1);
    assert_eq!(orchestrator.store().report_count(), 1);

    let report = orchestrator
        .store()
        .find_by_identity(&identity())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        report.sections.field(SectionName::Title, SectionField::Content),
        Some("Shapes around us")
    );
    assert_eq!(
        report.sections.field(SectionName::CurriculumArea, SectionField::Content),
        Some("Maths")
    );
    // Narrative fields written before the template survive
    assert_eq!(
        report.sections.field(SectionName::Before, SectionField::TeacherReport),
        Some("Counts to five")
    );

    let listing = orchestrator
        .get_classroom_reports(
            &UserContext::new("admin"),
            &ClassroomReportsQuery {
                term_id: "spring".to_string(),
                topic_id: "t1".to_string(),
                language: "en".to_string(),
                classroom_id: "c1".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.classroom_template.title, "Shapes around us");
    assert_eq!(listing.school_template.title, "");
    assert_eq!(listing.reports.len(), 1);
    assert_eq!(listing.reports[0].student_name, "Mai");
    assert_eq!(listing.summary.before, 10.0);
}

#[tokio::test]
async fn test_super_admin_cannot_apply_templates() {
    let orchestrator = setup();
    teacher_draft(&orchestrator).await;

    let request: ApplyTemplateRequest = serde_json::from_value(json!({
        "term_id": "spring",
        "topic_id": "t1",
        "language": "en",
        "title": "Shapes"
    }))
    .unwrap();

    let err = orchestrator
        .apply_school_template(&UserContext::new("root"), request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Forbidden(_)));

    let applied = orchestrator
        .apply_school_template(&UserContext::new("admin"), request)
        .await
        .unwrap();
    assert_eq!(applied.updated, 1);
    assert!(applied.template.key.scope.is_school());
}

#[tokio::test]
async fn test_overview_and_tasks_follow_the_reports() {
    let orchestrator = setup();
    teacher_draft(&orchestrator).await;
    orchestrator
        .upload_manager_report(
            &UserContext::new("admin"),
            upload(json!({"before": {"status": "manager"}})),
        )
        .await
        .unwrap();

    let overview = orchestrator.school_overview("spring").await.unwrap();
    assert_eq!(overview.classes.len(), 1);
    let class = &overview.classes[0];
    assert_eq!(class.classroom_name, "Sunflowers");
    assert_eq!(class.topics.len(), 1);
    assert_eq!(class.topics[0].topic_title, "Shapes");
    assert_eq!(class.topics[0].sample_count, 1);
    assert_eq!(class.topics[0].mean_before, 15.0);
    assert_eq!(class.average_topics_percentage, 15.0);
    assert_eq!(overview.overall_classes_percentage, 15.0);

    let classroom = orchestrator.classroom_overview("spring", "c1").await.unwrap();
    assert_eq!(&classroom, class);

    let unknown = orchestrator.classroom_overview("spring", "c9").await.unwrap();
    assert_eq!(unknown.classroom_id, "c9");
    assert!(unknown.topics.is_empty());

    let tasks = orchestrator.teacher_tasks(&UserContext::new("u1")).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task, "now");
    assert_eq!(tasks[0].status, "empty");
    assert_eq!(tasks[0].term_title, "Spring 2025");
    assert_eq!(tasks[0].topic_title, "Shapes");
    assert_eq!(tasks[0].student_name, "Mai");
}

#[tokio::test]
async fn test_uploaded_template_is_listed_without_touching_reports() {
    let orchestrator = setup();
    teacher_draft(&orchestrator).await;
    let before = orchestrator
        .store()
        .find_by_identity(&identity())
        .await
        .unwrap()
        .unwrap();

    let template = |body: Value| -> UploadPlanTemplateRequest {
        serde_json::from_value(body).unwrap()
    };
    let classroom = json!({
        "term_id": "spring",
        "topic_id": "t1",
        "language": "en",
        "classroom_id": "c1",
        "title": "Shapes around us",
        "introduction": "We look for shapes at school",
        "curriculum_area": "Maths"
    });

    let err = orchestrator
        .upload_plan_template(&UserContext::new("root"), template(classroom.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Forbidden(_)));

    let mut missing_classroom = classroom.clone();
    missing_classroom["classroom_id"] = Value::Null;
    let err = orchestrator
        .upload_plan_template(&UserContext::new("admin"), template(missing_classroom))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));

    let saved = orchestrator
        .upload_plan_template(&UserContext::new("admin"), template(classroom))
        .await
        .unwrap();
    assert!(!saved.key.scope.is_school());
    assert_eq!(saved.key.scope.organization_id(), "org");

    let mut school = json!({
        "term_id": "spring",
        "topic_id": "t1",
        "language": "en",
        "is_school": true,
        "title": "Shapes"
    });
    orchestrator
        .upload_plan_template(&UserContext::new("admin"), template(school.clone()))
        .await
        .unwrap();
    school["title"] = json!("Shapes and patterns");
    let updated = orchestrator
        .upload_plan_template(&UserContext::new("admin"), template(school))
        .await
        .unwrap();
    assert!(updated.key.scope.is_school());

    let listing = orchestrator
        .get_classroom_reports(
            &UserContext::new("admin"),
            &ClassroomReportsQuery {
                term_id: "spring".to_string(),
                topic_id: "t1".to_string(),
                language: "en".to_string(),
                classroom_id: "c1".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.classroom_template.title, "Shapes around us");
    assert_eq!(listing.classroom_template.curriculum_area, "Maths");
    assert_eq!(listing.school_template.title, "Shapes and patterns");

    let after = orchestrator
        .store()
        .find_by_identity(&identity())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(after.sections.get(SectionName::Title), None);
}
