use serde::{Deserialize, Serialize};

/// Manager comments from the previous term's `now` and `conclusion` sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerPrevious {
    pub term_title: String,
    pub now: String,
    pub now_updated_at: String,
    pub conclusion: String,
    pub conclusion_updated_at: String,
}

/// Teacher reports from the previous term's `now` and `conclusion` sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherPrevious {
    pub term_title: String,
    pub now: String,
    pub now_updated_at: String,
    pub conclusion: String,
    pub conclusion_updated_at: String,
}

impl ManagerPrevious {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl TeacherPrevious {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
