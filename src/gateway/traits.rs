use anyhow::Result;

use crate::model::{
    ClassroomRoster, CurrentUser, StudentInfo, TeacherInfo, Term, Topic, UserAccount, UserContext,
};

/// Sibling user service. `Ok(None)` means the entity does not exist.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_student_info(&self, student_id: &str) -> Result<Option<StudentInfo>>;
    /// Teacher profile of a user account inside an organization
    async fn get_teacher_info(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Option<TeacherInfo>>;
    async fn get_current_user(&self, ctx: &UserContext) -> Result<Option<CurrentUser>>;
    /// The account behind a teacher id; its id is what reports store as `editor_id`
    async fn get_user_by_teacher(&self, teacher_id: &str) -> Result<Option<UserAccount>>;
}

#[async_trait::async_trait]
pub trait TermDirectory: Send + Sync {
    async fn get_term_by_id(&self, term_id: &str) -> Result<Option<Term>>;
    async fn get_previous_term(&self, term_id: &str, organization_id: &str)
        -> Result<Option<Term>>;
}

#[async_trait::async_trait]
pub trait TopicDirectory: Send + Sync {
    async fn get_topic_by_id(&self, topic_id: &str) -> Result<Option<Topic>>;
}

#[async_trait::async_trait]
pub trait ClassroomDirectory: Send + Sync {
    async fn get_assigned_students(
        &self,
        term_id: &str,
        classroom_id: &str,
    ) -> Result<Option<ClassroomRoster>>;
    /// Every classroom roster of a term
    async fn list_classrooms(&self, term_id: &str) -> Result<Vec<ClassroomRoster>>;
}

pub trait Directory: UserDirectory + TermDirectory + TopicDirectory + ClassroomDirectory {}
impl<T: UserDirectory + TermDirectory + TopicDirectory + ClassroomDirectory> Directory for T {}
