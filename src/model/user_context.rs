use serde::{Deserialize, Serialize};

/// The acting user of a request, as established by the authentication layer in front of
/// this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    /// Bearer token forwarded to the sibling directories.
    pub token: Option<String>,
}

impl UserContext {
    /// Create a new UserContext with just a user ID
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: None,
        }
    }

    pub fn with_token(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.trim().is_empty()
    }
}
