use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ReportError, ReportResult};
use crate::gateway::traits::{
    ClassroomDirectory, Directory, TermDirectory, TopicDirectory, UserDirectory,
};
use crate::model::{
    ClassroomRoster, CurrentUser, StudentInfo, TeacherInfo, Term, Topic, UserAccount, UserContext,
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// The four sibling directories plus the deadline applied to every call.
///
/// Every lookup returns `UpstreamUnavailable` when the directory errors or misses the
/// deadline. Callers that only need enrichment pass the result through [`degrade`].
#[derive(Clone)]
pub struct Gateways {
    users: Arc<dyn UserDirectory>,
    terms: Arc<dyn TermDirectory>,
    topics: Arc<dyn TopicDirectory>,
    classrooms: Arc<dyn ClassroomDirectory>,
    timeout: Duration,
}

impl Gateways {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        terms: Arc<dyn TermDirectory>,
        topics: Arc<dyn TopicDirectory>,
        classrooms: Arc<dyn ClassroomDirectory>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            terms,
            topics,
            classrooms,
            timeout,
        }
    }

    /// Use one implementation for all four directories
    pub fn from_directory<D: Directory + 'static>(directory: Arc<D>, timeout: Duration) -> Self {
        Self::new(
            directory.clone(),
            directory.clone(),
            directory.clone(),
            directory,
            timeout,
        )
    }

    async fn call<T, F>(&self, what: String, call: F) -> ReportResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ReportError::UpstreamUnavailable(format!("{}: {}", what, e))),
            Err(_) => Err(ReportError::UpstreamUnavailable(format!(
                "{}: no answer within {}ms",
                what,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn student(&self, student_id: &str) -> ReportResult<Option<StudentInfo>> {
        self.call(
            format!("student {}", student_id),
            self.users.get_student_info(student_id),
        )
        .await
    }

    pub async fn teacher(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> ReportResult<Option<TeacherInfo>> {
        self.call(
            format!("teacher {} in {}", user_id, organization_id),
            self.users.get_teacher_info(user_id, organization_id),
        )
        .await
    }

    pub async fn current_user(&self, ctx: &UserContext) -> ReportResult<Option<CurrentUser>> {
        self.call(
            format!("current user {}", ctx.user_id),
            self.users.get_current_user(ctx),
        )
        .await
    }

    pub async fn user_by_teacher(&self, teacher_id: &str) -> ReportResult<Option<UserAccount>> {
        self.call(
            format!("user of teacher {}", teacher_id),
            self.users.get_user_by_teacher(teacher_id),
        )
        .await
    }

    pub async fn term(&self, term_id: &str) -> ReportResult<Option<Term>> {
        self.call(format!("term {}", term_id), self.terms.get_term_by_id(term_id))
            .await
    }

    pub async fn previous_term(
        &self,
        term_id: &str,
        organization_id: &str,
    ) -> ReportResult<Option<Term>> {
        self.call(
            format!("previous term of {}", term_id),
            self.terms.get_previous_term(term_id, organization_id),
        )
        .await
    }

    pub async fn topic(&self, topic_id: &str) -> ReportResult<Option<Topic>> {
        self.call(
            format!("topic {}", topic_id),
            self.topics.get_topic_by_id(topic_id),
        )
        .await
    }

    pub async fn assigned_students(
        &self,
        term_id: &str,
        classroom_id: &str,
    ) -> ReportResult<Option<ClassroomRoster>> {
        self.call(
            format!("classroom {} in term {}", classroom_id, term_id),
            self.classrooms.get_assigned_students(term_id, classroom_id),
        )
        .await
    }

    pub async fn classrooms(&self, term_id: &str) -> ReportResult<Vec<ClassroomRoster>> {
        self.call(
            format!("classrooms of term {}", term_id),
            self.classrooms.list_classrooms(term_id),
        )
        .await
    }
}

/// Turn a failed enrichment lookup into "absent", logging the failure.
pub fn degrade<T>(result: ReportResult<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Continuing without directory data: {}", e);
            None
        }
    }
}
