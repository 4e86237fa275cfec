use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ReportError, ReportResult};
use crate::gateway::{degrade, Gateways};
use crate::logic::aggregation::{AggregationEngine, TopicGroups};
use crate::logic::carry_forward::CarryForwardResolver;
use crate::logic::history::HistoryRecorder;
use crate::logic::merge::{MergeEngine, MergeOutcome, MergeRequest};
use crate::logic::status_scale::StatusScale;
use crate::logic::template::{TemplateApplication, TemplateApplicator};
use crate::model::{
    AssignedStudent, ClassroomOverview, ClassroomReports, ClassroomRoster, ClassroomStudentReport,
    CurrentUser, EditType, Id, OpenTask, Report, ReportFilter, ReportHistory, ReportIdentity,
    ReportPlanTemplate, ReportView, Role, SchoolOverview, Sections, TemplateContent, TemplateKey,
    TemplateScope, Topic, UserContext,
};
use crate::store::traits::Store;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// A role-scoped report upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReportRequest {
    pub student_id: Id,
    pub topic_id: Id,
    pub term_id: Id,
    pub language: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Manager uploads only
    #[serde(default)]
    pub editing: Option<bool>,
    #[serde(default)]
    pub sections: Sections,
}

impl UploadReportRequest {
    pub fn identity(&self) -> ReportIdentity {
        ReportIdentity::new(
            &self.student_id,
            &self.topic_id,
            &self.term_id,
            &self.language,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadClassroomReportRequest {
    #[serde(flatten)]
    pub report: UploadReportRequest,
    pub classroom_id: Id,
    /// Teacher who authored the report
    pub teacher_id: Id,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeacherReportQuery {
    pub student_id: Id,
    pub topic_id: Id,
    pub term_id: Id,
    pub language: String,
    pub teacher_id: Id,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassroomReportsQuery {
    pub term_id: Id,
    pub topic_id: Id,
    pub language: String,
    pub classroom_id: Id,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyTemplateRequest {
    pub term_id: Id,
    pub topic_id: Id,
    pub language: String,
    #[serde(flatten)]
    pub content: TemplateContent,
}

/// A plan template saved without touching any report.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadPlanTemplateRequest {
    #[serde(flatten)]
    pub template: ApplyTemplateRequest,
    #[serde(default)]
    pub is_school: bool,
    /// Required unless `is_school`
    #[serde(default)]
    pub classroom_id: Option<Id>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyClassroomTemplateRequest {
    #[serde(flatten)]
    pub template: ApplyTemplateRequest,
    pub classroom_id: Id,
}

/// Entry point for every report operation. Composes the merge, aggregation, carry-forward,
/// template and history components with the store and the sibling directories.
pub struct ReportOrchestrator<S: Store> {
    store: Arc<S>,
    gateways: Gateways,
    aggregation: AggregationEngine,
    fetch_concurrency: usize,
}

impl<S: Store> ReportOrchestrator<S> {
    pub fn new(store: Arc<S>, gateways: Gateways) -> Self {
        Self {
            store,
            gateways,
            aggregation: AggregationEngine::default(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_status_scale(mut self, scale: StatusScale) -> Self {
        self.aggregation = AggregationEngine::new(scale);
        self
    }

    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_user(ctx: &UserContext) -> ReportResult<()> {
        if ctx.is_anonymous() {
            return Err(ReportError::Forbidden("no acting user".to_string()));
        }
        Ok(())
    }

    async fn current_user(&self, ctx: &UserContext) -> ReportResult<CurrentUser> {
        Self::require_user(ctx)?;
        self.gateways
            .current_user(ctx)
            .await?
            .ok_or_else(|| ReportError::Forbidden(format!("unknown user {}", ctx.user_id)))
    }

    /// The caller must be a school administrator, not a platform super admin.
    async fn school_admin(&self, ctx: &UserContext, action: &str) -> ReportResult<Id> {
        let user = self.current_user(ctx).await?;
        if user.is_super_admin {
            return Err(ReportError::Forbidden(format!(
                "super admin cannot {}",
                action
            )));
        }
        user.organization_id.ok_or_else(|| {
            ReportError::Forbidden(format!("user {} administers no organization", user.id))
        })
    }

    /// Teacher upload from the app. Creates the report on first upload.
    pub async fn upload_teacher_report(
        &self,
        ctx: &UserContext,
        request: UploadReportRequest,
    ) -> ReportResult<MergeOutcome> {
        Self::require_user(ctx)?;
        let identity = request.identity();
        identity.validate()?;

        let student = self
            .gateways
            .student(&identity.student_id)
            .await?
            .ok_or_else(|| ReportError::not_found(format!("student {}", identity.student_id)))?;
        if self
            .gateways
            .teacher(&ctx.user_id, &student.organization_id)
            .await?
            .is_none()
        {
            return Err(ReportError::Forbidden(format!(
                "user {} is not a teacher in organization {}",
                ctx.user_id, student.organization_id
            )));
        }

        MergeEngine::merge(
            self.store.as_ref(),
            MergeRequest {
                identity,
                role: Role::Teacher,
                editor_id: ctx.user_id.clone(),
                status: request.status,
                editing: None,
                sections: request.sections,
                edit_type: EditType::AppStudentView,
                classroom_id: None,
            },
        )
        .await
    }

    /// Manager review from the student view. The report must already exist.
    pub async fn upload_manager_report(
        &self,
        ctx: &UserContext,
        request: UploadReportRequest,
    ) -> ReportResult<MergeOutcome> {
        Self::require_user(ctx)?;
        MergeEngine::merge(
            self.store.as_ref(),
            MergeRequest {
                identity: request.identity(),
                role: Role::Manager,
                editor_id: ctx.user_id.clone(),
                status: request.status,
                editing: request.editing,
                sections: request.sections,
                edit_type: EditType::WebStudentView,
                classroom_id: None,
            },
        )
        .await
    }

    /// Manager review from the classroom view, against the report written by `teacher_id`.
    pub async fn upload_classroom_report(
        &self,
        ctx: &UserContext,
        request: UploadClassroomReportRequest,
    ) -> ReportResult<MergeOutcome> {
        Self::require_user(ctx)?;
        let identity = request.report.identity();
        identity.validate()?;

        let editor = self
            .gateways
            .user_by_teacher(&request.teacher_id)
            .await?
            .ok_or_else(|| ReportError::not_found(format!("teacher {}", request.teacher_id)))?;
        let existing = self
            .store
            .find_many(&ReportFilter::identity_and_editor(&identity, &editor.id))
            .await?;
        if existing.is_empty() {
            return Err(ReportError::not_found(format!(
                "report {} by teacher {} (a teacher must create it first)",
                identity, request.teacher_id
            )));
        }

        MergeEngine::merge(
            self.store.as_ref(),
            MergeRequest {
                identity,
                role: Role::Manager,
                editor_id: ctx.user_id.clone(),
                status: request.report.status,
                editing: request.report.editing,
                sections: request.report.sections,
                edit_type: EditType::WebClassroomView,
                classroom_id: Some(request.classroom_id),
            },
        )
        .await
    }

    async fn view(&self, report: Report, organization_id: &str) -> ReportView {
        let (manager_previous_term, teacher_previous_term) = CarryForwardResolver::resolve(
            self.store.as_ref(),
            &self.gateways,
            &report,
            organization_id,
        )
        .await;
        let editor = if report.editor_id.is_empty() {
            None
        } else {
            degrade(self.gateways.teacher(&report.editor_id, organization_id).await)
        };

        ReportView {
            progress: self.aggregation.progress(&report),
            report,
            editor,
            manager_previous_term,
            teacher_previous_term,
        }
    }

    async fn student_view(&self, report: Report) -> ReportResult<ReportView> {
        let student = self
            .gateways
            .student(&report.identity.student_id)
            .await?
            .ok_or_else(|| {
                ReportError::not_found(format!("student {}", report.identity.student_id))
            })?;
        Ok(self.view(report, &student.organization_id).await)
    }

    pub async fn get_report(&self, identity: &ReportIdentity) -> ReportResult<ReportView> {
        identity.validate()?;
        let report = self
            .store
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| ReportError::not_found(format!("report {}", identity)))?;
        self.student_view(report).await
    }

    /// The report a given teacher wrote, as seen by a school administrator.
    pub async fn get_teacher_report(
        &self,
        ctx: &UserContext,
        query: &TeacherReportQuery,
    ) -> ReportResult<ReportView> {
        let user = self.current_user(ctx).await?;
        if user.is_super_admin {
            return Err(ReportError::Forbidden(
                "super admin cannot read reports".to_string(),
            ));
        }

        let identity = ReportIdentity::new(
            &query.student_id,
            &query.topic_id,
            &query.term_id,
            &query.language,
        );
        identity.validate()?;
        let editor = self
            .gateways
            .user_by_teacher(&query.teacher_id)
            .await?
            .ok_or_else(|| ReportError::not_found(format!("teacher {}", query.teacher_id)))?;
        let report = self
            .store
            .find_many(&ReportFilter::identity_and_editor(&identity, &editor.id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReportError::not_found(format!("report {}", identity)))?;

        self.student_view(report).await
    }

    async fn template_content(&self, key: TemplateKey) -> TemplateContent {
        match self.store.find_template(&key).await {
            Ok(template) => template.map(|t| t.content).unwrap_or_default(),
            Err(e) => {
                log::warn!("Template lookup failed: {}", e);
                TemplateContent::default()
            }
        }
    }

    /// Reports of every student assigned to a classroom, with both templates and a summary.
    pub async fn get_classroom_reports(
        &self,
        ctx: &UserContext,
        query: &ClassroomReportsQuery,
    ) -> ReportResult<ClassroomReports> {
        let user = self.current_user(ctx).await?;
        let organization_id = user.organization_id.unwrap_or_default();
        let key = |scope: TemplateScope| TemplateKey {
            scope,
            topic_id: query.topic_id.clone(),
            term_id: query.term_id.clone(),
            language: query.language.clone(),
        };

        let mut listing = ClassroomReports {
            school_template: self
                .template_content(key(TemplateScope::School {
                    organization_id: organization_id.clone(),
                }))
                .await,
            classroom_template: self
                .template_content(key(TemplateScope::Classroom {
                    organization_id: organization_id.clone(),
                    classroom_id: query.classroom_id.clone(),
                }))
                .await,
            ..Default::default()
        };

        let Some(roster) = degrade(
            self.gateways
                .assigned_students(&query.term_id, &query.classroom_id)
                .await,
        ) else {
            return Ok(listing);
        };

        for student in roster.students {
            let identity = ReportIdentity::new(
                &student.student_id,
                &query.topic_id,
                &query.term_id,
                &query.language,
            );
            let report = match self.store.find_by_identity(&identity).await {
                Ok(Some(report)) => report,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Skipping {} in classroom listing: {}", identity, e);
                    continue;
                }
            };
            let student_org = if student.organization_id.is_empty() {
                organization_id.as_str()
            } else {
                student.organization_id.as_str()
            };
            let view = self.view(report, student_org).await;
            listing.reports.push(ClassroomStudentReport {
                student_id: student.student_id,
                student_name: student.student_name,
                avatar_url: student.avatar_url,
                view,
            });
        }

        listing.summary = self
            .aggregation
            .summarize(listing.reports.iter().map(|r| &r.view.report));
        Ok(listing)
    }

    /// Sections still waiting on the calling teacher across all their reports.
    pub async fn teacher_tasks(&self, ctx: &UserContext) -> ReportResult<Vec<OpenTask>> {
        Self::require_user(ctx)?;
        let reports = self
            .store
            .find_many(&ReportFilter::by_editor(&ctx.user_id))
            .await?;

        let mut tasks = Vec::new();
        for report in &reports {
            let open = self.aggregation.open_task_sections(report);
            if open.is_empty() {
                continue;
            }

            let term_title = degrade(self.gateways.term(&report.identity.term_id).await)
                .map(|t| t.title)
                .unwrap_or_default();
            let topic_title = degrade(self.gateways.topic(&report.identity.topic_id).await)
                .map(|t| t.title)
                .unwrap_or_default();
            let student_name =
                degrade(self.gateways.student(&report.identity.student_id).await)
                    .map(|s| s.name)
                    .unwrap_or_default();

            tasks.extend(open.into_iter().map(|(section, status)| OpenTask {
                term_title: term_title.clone(),
                topic_title: topic_title.clone(),
                student_name: student_name.clone(),
                language: report.identity.language.clone(),
                task: section.to_string(),
                status: status.to_string(),
            }));
        }

        Ok(tasks)
    }

    /// Topic groups of one teacher/student assignment; failures yield no samples.
    async fn assignment_groups(&self, term_id: &str, assignment: &AssignedStudent) -> TopicGroups {
        let Some(teacher_id) = assignment.teacher_id.as_deref() else {
            return TopicGroups::new();
        };
        let Some(editor) = degrade(self.gateways.user_by_teacher(teacher_id).await) else {
            return TopicGroups::new();
        };
        let filter = ReportFilter::editor_student_term(&editor.id, &assignment.student_id, term_id);
        match self.store.find_many(&filter).await {
            Ok(reports) => self.aggregation.group_by_topic(&reports),
            Err(e) => {
                log::warn!(
                    "Leaving student {} out of the overview: {}",
                    assignment.student_id,
                    e
                );
                TopicGroups::new()
            }
        }
    }

    async fn roster_overview(&self, term_id: &str, roster: &ClassroomRoster) -> ClassroomOverview {
        // Owned assignments keep the fetch futures Send for the axum handlers
        let partials: Vec<TopicGroups> = stream::iter(roster.students.clone())
            .map(|assignment| async move { self.assignment_groups(term_id, &assignment).await })
            .buffer_unordered(self.fetch_concurrency)
            .collect()
            .await;

        let mut groups = TopicGroups::new();
        for partial in &partials {
            AggregationEngine::merge_topic_groups(&mut groups, partial);
        }

        let mut topics: HashMap<Id, Topic> = HashMap::new();
        for topic_id in groups.keys() {
            if let Some(topic) = degrade(self.gateways.topic(topic_id).await) {
                topics.insert(topic_id.clone(), topic);
            }
        }

        log::debug!(
            "Classroom {}: {} topic(s) from {} assignment(s)",
            roster.classroom_id,
            groups.len(),
            roster.students.len()
        );
        self.aggregation.classroom_overview(
            &roster.classroom_id,
            &roster.classroom_name,
            self.aggregation.topic_aggregates(&groups, &topics),
        )
    }

    /// Progress of every classroom of a term.
    pub async fn school_overview(&self, term_id: &str) -> ReportResult<SchoolOverview> {
        let rosters = match self.gateways.classrooms(term_id).await {
            Ok(rosters) => rosters,
            Err(e) => {
                log::warn!("School overview for term {} has no classrooms: {}", term_id, e);
                Vec::new()
            }
        };

        let mut classes = Vec::with_capacity(rosters.len());
        for roster in &rosters {
            classes.push(self.roster_overview(term_id, roster).await);
        }
        Ok(self.aggregation.school_overview(classes))
    }

    pub async fn classroom_overview(
        &self,
        term_id: &str,
        classroom_id: &str,
    ) -> ReportResult<ClassroomOverview> {
        let roster = degrade(self.gateways.assigned_students(term_id, classroom_id).await)
            .unwrap_or_else(|| ClassroomRoster {
                classroom_id: classroom_id.to_string(),
                ..Default::default()
            });
        Ok(self.roster_overview(term_id, &roster).await)
    }

    /// Save a school or classroom template. Reports only pick it up when it is applied.
    pub async fn upload_plan_template(
        &self,
        ctx: &UserContext,
        request: UploadPlanTemplateRequest,
    ) -> ReportResult<ReportPlanTemplate> {
        let organization_id = self.school_admin(ctx, "upload templates").await?;
        let scope = if request.is_school {
            TemplateScope::School { organization_id }
        } else {
            let classroom_id = request
                .classroom_id
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| {
                    ReportError::validation("classroom_id is required for a classroom template")
                })?;
            TemplateScope::Classroom {
                organization_id,
                classroom_id,
            }
        };

        let template = request.template;
        TemplateApplicator::save(
            self.store.as_ref(),
            scope,
            &template.term_id,
            &template.topic_id,
            &template.language,
            template.content,
        )
        .await
    }

    pub async fn apply_school_template(
        &self,
        ctx: &UserContext,
        request: ApplyTemplateRequest,
    ) -> ReportResult<TemplateApplication> {
        let organization_id = self.school_admin(ctx, "apply templates").await?;
        TemplateApplicator::apply_school_template(
            self.store.as_ref(),
            &request.term_id,
            &request.topic_id,
            &request.language,
            &organization_id,
            request.content,
        )
        .await
    }

    pub async fn apply_classroom_template(
        &self,
        ctx: &UserContext,
        request: ApplyClassroomTemplateRequest,
    ) -> ReportResult<TemplateApplication> {
        let organization_id = self.school_admin(ctx, "apply templates").await?;
        let template = request.template;
        TemplateApplicator::apply_classroom_template(
            self.store.as_ref(),
            &self.gateways,
            &template.term_id,
            &template.topic_id,
            &template.language,
            &organization_id,
            &request.classroom_id,
            template.content,
        )
        .await
    }

    pub async fn editor_histories(
        &self,
        editor_id: &str,
        role: Role,
    ) -> ReportResult<Vec<ReportHistory>> {
        HistoryRecorder::list_by_editor(self.store.as_ref(), editor_id, role).await
    }
}
