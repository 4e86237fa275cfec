use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// The acting role of a merge. Each role owns its own fields of every narrative section;
/// only `status` is written by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Manager => "manager",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "teacher" => Some(Role::Teacher),
            "manager" => Some(Role::Manager),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
