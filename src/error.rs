use thiserror::Error;

/// Failure taxonomy of the report engine.
///
/// Callers branch on the variant (see [`ReportError::is_not_found`]), never on the message.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The targeted report (or other required entity) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is malformed: missing identity components, unknown sections or fields.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A directory lookup failed or timed out.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ReportError::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        ReportError::Validation(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportError::NotFound(_))
    }
}
