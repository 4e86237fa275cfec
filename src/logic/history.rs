use crate::error::ReportResult;
use crate::model::{EditType, Id, Report, ReportHistory, Role};
use crate::store::traits::HistoryStore;

/// Appends the audit trail of report merges.
pub struct HistoryRecorder;

impl HistoryRecorder {
    /// Append a snapshot of `report` as it stands after a merge
    pub async fn record<S: HistoryStore + ?Sized>(
        store: &S,
        report: &Report,
        editor_id: &str,
        editor_role: Role,
        edit_type: EditType,
        classroom_id: Option<Id>,
    ) -> ReportResult<ReportHistory> {
        let history = ReportHistory::new(
            report.clone(),
            editor_id.to_string(),
            editor_role,
            edit_type,
            classroom_id,
        );
        store.append_history(history.clone()).await?;
        log::debug!(
            "Recorded {} history {} for report {}",
            edit_type.as_str(),
            history.id,
            report.id
        );
        Ok(history)
    }

    pub async fn list_by_editor<S: HistoryStore + ?Sized>(
        store: &S,
        editor_id: &str,
        editor_role: Role,
    ) -> ReportResult<Vec<ReportHistory>> {
        Ok(store.list_histories_by_editor(editor_id, editor_role).await?)
    }
}
