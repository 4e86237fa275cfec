use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ReportError, ReportResult};
use crate::logic::history::HistoryRecorder;
use crate::model::{
    EditType, FieldOwner, FieldSet, Id, Report, ReportIdentity, Role, Sections,
};
use crate::store::traits::Store;

/// A role-scoped partial update of one report.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub identity: ReportIdentity,
    pub role: Role,
    /// Acting user; becomes the report's `editor_id` on the teacher path
    pub editor_id: String,
    pub status: Option<String>,
    /// Only honoured on the manager path
    pub editing: Option<bool>,
    pub sections: Sections,
    pub edit_type: EditType,
    pub classroom_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub report: Report,
    /// Every field path the merge assigned, top-level fields first
    pub updated_paths: Vec<String>,
    pub created: bool,
    pub history_id: Id,
}

/// Applies role-partitioned partial updates to reports.
///
/// Each role owns a disjoint slice of every narrative section (see
/// [`SectionField::owner`](crate::model::SectionField::owner)); a merge only ever
/// assigns the fields its role may write, one field path at a time, so concurrent merges
/// from both roles land without overwriting each other.
pub struct MergeEngine;

impl MergeEngine {
    /// Translate incoming sections into the field assignments `role` is allowed to make.
    pub fn build_field_set(
        role: Role,
        sections: &Sections,
        status: Option<&str>,
        editor_id: &str,
        editing: Option<bool>,
        now: DateTime<Utc>,
    ) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.status = status.map(str::to_string);
        fields.updated_at = Some(now);

        match role {
            Role::Teacher => {
                fields.editor_id = Some(editor_id.to_string());
                for (name, section) in sections.iter() {
                    // Static sections belong to templates
                    if name.is_static() {
                        continue;
                    }
                    for (field, value) in section.present_fields() {
                        if field.owner() != FieldOwner::Manager {
                            fields.assign(*name, field, value);
                        }
                    }
                }
            }
            Role::Manager => {
                fields.editing = editing;
                for (name, section) in sections.iter() {
                    for (field, value) in section.present_fields() {
                        if field.owner() != FieldOwner::Teacher {
                            fields.assign(*name, field, value);
                        }
                    }
                }
            }
        }

        fields
    }

    /// Merge a partial update into the stored report and record the result in history.
    ///
    /// The teacher path creates the report when it does not exist yet; the manager path
    /// fails with `NotFound` and writes nothing.
    pub async fn merge<S: Store + ?Sized>(
        store: &S,
        request: MergeRequest,
    ) -> ReportResult<MergeOutcome> {
        request.identity.validate()?;

        let fields = Self::build_field_set(
            request.role,
            &request.sections,
            request.status.as_deref(),
            &request.editor_id,
            request.editing,
            Utc::now(),
        );
        let allow_upsert = request.role == Role::Teacher;

        let result = store
            .upsert_fields(&request.identity, &fields, allow_upsert)
            .await?;

        let report = match result.report {
            Some(report) if result.matched_count > 0 || result.upserted => report,
            _ => {
                return Err(ReportError::not_found(format!(
                    "report {} (a teacher must create it first)",
                    request.identity
                )))
            }
        };

        let updated_paths = fields.paths();
        log::info!(
            "{} merge on report {} ({}): {} field(s){}",
            request.role,
            report.id,
            request.identity,
            updated_paths.len(),
            if result.upserted { ", created" } else { "" }
        );

        let history = HistoryRecorder::record(
            store,
            &report,
            &request.editor_id,
            request.role,
            request.edit_type,
            request.classroom_id,
        )
        .await?;

        Ok(MergeOutcome {
            report,
            updated_paths,
            created: result.upserted,
            history_id: history.id,
        })
    }
}
