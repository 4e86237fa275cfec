use crate::model::{
    FieldSet, Report, ReportFilter, ReportHistory, ReportIdentity, ReportPlanTemplate, Role,
    TemplateKey,
};
use anyhow::Result;

/// Outcome of a field-path write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWriteResult {
    /// Number of existing reports matched by the identity filter (0 or 1).
    pub matched_count: u64,
    /// True when the write created the report.
    pub upserted: bool,
    /// The report as it stands after the write; `None` when nothing matched and no upsert
    /// was allowed.
    pub report: Option<Report>,
}

impl FieldWriteResult {
    pub fn unmatched() -> Self {
        Self {
            matched_count: 0,
            upserted: false,
            report: None,
        }
    }
}

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Get the report with this identity tuple
    async fn find_by_identity(&self, identity: &ReportIdentity) -> Result<Option<Report>>;
    /// List reports matching the filter, ordered by creation time
    async fn find_many(&self, filter: &ReportFilter) -> Result<Vec<Report>>;
    /// Atomically apply a set of field assignments to the report with this identity.
    ///
    /// When no report matches and `allow_upsert` is true, a report is created with the
    /// identity and the assigned fields; otherwise the result is unmatched and nothing is
    /// written.
    async fn upsert_fields(
        &self,
        identity: &ReportIdentity,
        fields: &FieldSet,
        allow_upsert: bool,
    ) -> Result<FieldWriteResult>;
}

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append an audit entry; entries are never updated or deleted
    async fn append_history(&self, history: ReportHistory) -> Result<()>;
    /// List entries written by an editor acting in a role, newest first
    async fn list_histories_by_editor(&self, editor_id: &str, role: Role)
        -> Result<Vec<ReportHistory>>;
}

#[async_trait::async_trait]
pub trait TemplateStore: Send + Sync {
    /// Create or update the template with this key, keeping its id and creation time
    async fn upsert_template(&self, template: ReportPlanTemplate) -> Result<ReportPlanTemplate>;
    async fn find_template(&self, key: &TemplateKey) -> Result<Option<ReportPlanTemplate>>;
}

pub trait Store: ReportStore + HistoryStore + TemplateStore + Send + Sync {}
impl<T: ReportStore + HistoryStore + TemplateStore + Send + Sync> Store for T {}
