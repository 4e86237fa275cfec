use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{
    FieldSet, Report, ReportFilter, ReportHistory, ReportIdentity, ReportPlanTemplate, Role,
    TemplateKey,
};
use crate::store::traits::{FieldWriteResult, HistoryStore, ReportStore, TemplateStore};

/// Process-local store used by tests and single-node development runs.
///
/// Each write takes the lock once, so a field set is applied atomically just like the
/// single-statement Postgres upsert.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    reports: RwLock<HashMap<ReportIdentity, Report>>,
    histories: RwLock<Vec<ReportHistory>>,
    templates: RwLock<HashMap<TemplateKey, ReportPlanTemplate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a whole report. Test fixtures only; engine code writes field sets.
    pub fn put_report(&self, report: Report) {
        self.reports.write().insert(report.identity.clone(), report);
    }

    pub fn report_count(&self) -> usize {
        self.reports.read().len()
    }

    pub fn history_count(&self) -> usize {
        self.histories.read().len()
    }
}

#[async_trait::async_trait]
impl ReportStore for InMemoryStore {
    async fn find_by_identity(&self, identity: &ReportIdentity) -> Result<Option<Report>> {
        Ok(self.reports.read().get(identity).cloned())
    }

    async fn find_many(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .reports
            .read()
            .values()
            .filter(|report| filter.matches(report))
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reports)
    }

    async fn upsert_fields(
        &self,
        identity: &ReportIdentity,
        fields: &FieldSet,
        allow_upsert: bool,
    ) -> Result<FieldWriteResult> {
        let mut reports = self.reports.write();

        if let Some(report) = reports.get_mut(identity) {
            report.apply(fields);
            return Ok(FieldWriteResult {
                matched_count: 1,
                upserted: false,
                report: Some(report.clone()),
            });
        }

        if !allow_upsert {
            return Ok(FieldWriteResult::unmatched());
        }

        let mut report = Report::new(identity.clone(), fields.updated_at.unwrap_or_else(Utc::now));
        report.apply(fields);
        reports.insert(identity.clone(), report.clone());

        Ok(FieldWriteResult {
            matched_count: 0,
            upserted: true,
            report: Some(report),
        })
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryStore {
    async fn append_history(&self, history: ReportHistory) -> Result<()> {
        self.histories.write().push(history);
        Ok(())
    }

    async fn list_histories_by_editor(
        &self,
        editor_id: &str,
        role: Role,
    ) -> Result<Vec<ReportHistory>> {
        let mut histories: Vec<ReportHistory> = self
            .histories
            .read()
            .iter()
            .filter(|h| h.editor_id == editor_id && h.editor_role == role)
            .cloned()
            .collect();
        // Stable sort keeps append order for identical timestamps
        histories.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(histories)
    }
}

#[async_trait::async_trait]
impl TemplateStore for InMemoryStore {
    async fn upsert_template(&self, template: ReportPlanTemplate) -> Result<ReportPlanTemplate> {
        let mut templates = self.templates.write();
        let stored = match templates.get(&template.key) {
            Some(existing) => ReportPlanTemplate {
                id: existing.id.clone(),
                created_at: existing.created_at,
                ..template
            },
            None => template,
        };
        templates.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_template(&self, key: &TemplateKey) -> Result<Option<ReportPlanTemplate>> {
        Ok(self.templates.read().get(key).cloned())
    }
}
