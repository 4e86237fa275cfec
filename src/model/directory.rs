//! Records returned by the sibling user, term, topic and classroom directories.

use serde::{Deserialize, Serialize};

use crate::model::Id;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub id: Id,
    pub organization_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherInfo {
    pub id: Id,
    pub user_id: Id,
    pub organization_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The authenticated caller as known by the user directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Id,
    #[serde(default)]
    pub is_super_admin: bool,
    /// Organization the caller administers, if any.
    #[serde(default)]
    pub organization_id: Option<Id>,
}

/// A platform account; teachers map onto one of these and report `editor_id`s are account ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: Id,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub main_image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignedStudent {
    pub student_id: Id,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub organization_id: Id,
    /// Teacher responsible for this student in the classroom.
    #[serde(default)]
    pub teacher_id: Option<Id>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassroomRoster {
    pub classroom_id: Id,
    pub classroom_name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub students: Vec<AssignedStudent>,
}
