use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use crate::model::{
    generate_id, EditType, FieldSet, Report, ReportFilter, ReportHistory, ReportIdentity,
    ReportPlanTemplate, Role, Sections, TemplateContent, TemplateKey, TemplateScope,
};
use crate::store::traits::{FieldWriteResult, HistoryStore, ReportStore, TemplateStore};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const REPORT_COLUMNS: &str =
    "id, student_id, topic_id, term_id, language, editor_id, status, editing, sections, created_at, updated_at";

// Merges each patched section object key by key into the stored one. `r.sections` is the
// row being updated, so concurrent writers to different keys of the same section both land.
const SECTIONS_MERGE: &str = "r.sections || (
        SELECT COALESCE(jsonb_object_agg(p.key, COALESCE(r.sections -> p.key, '{}'::jsonb) || p.value), '{}'::jsonb)
        FROM jsonb_each(%PATCH%) AS p
    )";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Apply pending migrations from `migrations/`; applied versions are tracked by sqlx.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Report schema is up to date");
        Ok(())
    }
}

fn report_from_row(row: &PgRow) -> Result<Report> {
    let sections: serde_json::Value = row.try_get("sections")?;
    let sections = Sections::from_json(sections).context("Stored report has invalid sections")?;

    Ok(Report {
        id: row.try_get("id")?,
        identity: ReportIdentity {
            student_id: row.try_get("student_id")?,
            topic_id: row.try_get("topic_id")?,
            term_id: row.try_get("term_id")?,
            language: row.try_get("language")?,
        },
        editor_id: row.try_get("editor_id")?,
        status: row.try_get("status")?,
        editing: row.try_get("editing")?,
        sections,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<ReportHistory> {
    let role: String = row.try_get("editor_role")?;
    let edit_type: String = row.try_get("edit_type")?;
    let report: serde_json::Value = row.try_get("report")?;

    Ok(ReportHistory {
        id: row.try_get("id")?,
        report_id: row.try_get("report_id")?,
        editor_id: row.try_get("editor_id")?,
        editor_role: Role::parse(&role).ok_or_else(|| anyhow!("Unknown editor role: {}", role))?,
        edit_type: EditType::parse(&edit_type)
            .ok_or_else(|| anyhow!("Unknown edit type: {}", edit_type))?,
        classroom_id: row.try_get("classroom_id")?,
        report: serde_json::from_value(report).context("Stored history has invalid report")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

#[async_trait::async_trait]
impl ReportStore for PostgresStore {
    async fn find_by_identity(&self, identity: &ReportIdentity) -> Result<Option<Report>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM reports WHERE student_id = $1 AND topic_id = $2 AND term_id = $3 AND language = $4",
            REPORT_COLUMNS
        ))
        .bind(&identity.student_id)
        .bind(&identity.topic_id)
        .bind(&identity.term_id)
        .bind(&identity.language)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch report")?;

        row.as_ref().map(report_from_row).transpose()
    }

    async fn find_many(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM reports WHERE TRUE", REPORT_COLUMNS));

        for (column, value) in [
            ("student_id", &filter.student_id),
            ("topic_id", &filter.topic_id),
            ("term_id", &filter.term_id),
            ("language", &filter.language),
            ("editor_id", &filter.editor_id),
        ] {
            if let Some(value) = value {
                query
                    .push(format!(" AND {} = ", column))
                    .push_bind(value.clone());
            }
        }
        query.push(" ORDER BY created_at, id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list reports")?;

        rows.iter().map(report_from_row).collect()
    }

    async fn upsert_fields(
        &self,
        identity: &ReportIdentity,
        fields: &FieldSet,
        allow_upsert: bool,
    ) -> Result<FieldWriteResult> {
        let patch = fields.sections_patch();

        if allow_upsert {
            let sql = format!(
                r#"
                INSERT INTO reports AS r ({columns})
                VALUES ($1, $2, $3, $4, $5, COALESCE($6, ''), COALESCE($7, ''), COALESCE($8, TRUE), $9, $10, $10)
                ON CONFLICT (student_id, topic_id, term_id, language) DO UPDATE SET
                    editor_id = COALESCE($6, r.editor_id),
                    status = COALESCE($7, r.status),
                    editing = COALESCE($8, r.editing),
                    sections = {merge},
                    updated_at = COALESCE($11, r.updated_at)
                RETURNING {columns}, (xmax = 0) AS inserted
                "#,
                columns = REPORT_COLUMNS,
                merge = SECTIONS_MERGE.replace("%PATCH%", "$9"),
            );
            let row = sqlx::query(&sql)
                .bind(generate_id())
                .bind(&identity.student_id)
                .bind(&identity.topic_id)
                .bind(&identity.term_id)
                .bind(&identity.language)
                .bind(&fields.editor_id)
                .bind(&fields.status)
                .bind(fields.editing)
                .bind(&patch)
                .bind(fields.updated_at.unwrap_or_else(Utc::now))
                .bind(fields.updated_at)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to upsert report {}", identity))?;

            let inserted: bool = row.try_get("inserted")?;
            return Ok(FieldWriteResult {
                matched_count: if inserted { 0 } else { 1 },
                upserted: inserted,
                report: Some(report_from_row(&row)?),
            });
        }

        let sql = format!(
            r#"
            UPDATE reports AS r SET
                editor_id = COALESCE($5, r.editor_id),
                status = COALESCE($6, r.status),
                editing = COALESCE($7, r.editing),
                sections = {merge},
                updated_at = COALESCE($9, r.updated_at)
            WHERE r.student_id = $1 AND r.topic_id = $2 AND r.term_id = $3 AND r.language = $4
            RETURNING {columns}
            "#,
            columns = REPORT_COLUMNS,
            merge = SECTIONS_MERGE.replace("%PATCH%", "$8"),
        );
        let row = sqlx::query(&sql)
            .bind(&identity.student_id)
            .bind(&identity.topic_id)
            .bind(&identity.term_id)
            .bind(&identity.language)
            .bind(&fields.editor_id)
            .bind(&fields.status)
            .bind(fields.editing)
            .bind(&patch)
            .bind(fields.updated_at)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to update report {}", identity))?;

        match row {
            Some(row) => Ok(FieldWriteResult {
                matched_count: 1,
                upserted: false,
                report: Some(report_from_row(&row)?),
            }),
            None => Ok(FieldWriteResult::unmatched()),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PostgresStore {
    async fn append_history(&self, history: ReportHistory) -> Result<()> {
        let snapshot = serde_json::to_value(&history.report)?;
        sqlx::query(
            r#"
            INSERT INTO report_histories (id, report_id, editor_id, editor_role, edit_type, classroom_id, report, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&history.id)
        .bind(&history.report_id)
        .bind(&history.editor_id)
        .bind(history.editor_role.as_str())
        .bind(history.edit_type.as_str())
        .bind(&history.classroom_id)
        .bind(&snapshot)
        .bind(history.recorded_at)
        .execute(&self.pool)
        .await
        .context("Failed to append report history")?;

        Ok(())
    }

    async fn list_histories_by_editor(
        &self,
        editor_id: &str,
        role: Role,
    ) -> Result<Vec<ReportHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, report_id, editor_id, editor_role, edit_type, classroom_id, report, recorded_at
            FROM report_histories
            WHERE editor_id = $1 AND editor_role = $2
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(editor_id)
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list report histories")?;

        rows.iter().map(history_from_row).collect()
    }
}

#[async_trait::async_trait]
impl TemplateStore for PostgresStore {
    async fn upsert_template(&self, template: ReportPlanTemplate) -> Result<ReportPlanTemplate> {
        let key = &template.key;
        let row = sqlx::query(
            r#"
            INSERT INTO report_plan_templates
                (id, organization_id, classroom_id, is_school, topic_id, term_id, language,
                 title, introduction, curriculum_area, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (organization_id, classroom_id, is_school, topic_id, term_id, language) DO UPDATE SET
                title = EXCLUDED.title,
                introduction = EXCLUDED.introduction,
                curriculum_area = EXCLUDED.curriculum_area,
                updated_at = EXCLUDED.updated_at
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&template.id)
        .bind(key.scope.organization_id())
        .bind(key.scope.classroom_id())
        .bind(key.scope.is_school())
        .bind(&key.topic_id)
        .bind(&key.term_id)
        .bind(&key.language)
        .bind(&template.content.title)
        .bind(&template.content.introduction)
        .bind(&template.content.curriculum_area)
        .bind(template.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert report plan template")?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        Ok(ReportPlanTemplate {
            id: row.try_get("id")?,
            created_at,
            updated_at,
            ..template
        })
    }

    async fn find_template(&self, key: &TemplateKey) -> Result<Option<ReportPlanTemplate>> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, classroom_id, is_school, title, introduction, curriculum_area, created_at, updated_at
            FROM report_plan_templates
            WHERE organization_id = $1 AND classroom_id = $2 AND is_school = $3
              AND topic_id = $4 AND term_id = $5 AND language = $6
            "#,
        )
        .bind(key.scope.organization_id())
        .bind(key.scope.classroom_id())
        .bind(key.scope.is_school())
        .bind(&key.topic_id)
        .bind(&key.term_id)
        .bind(&key.language)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch report plan template")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let organization_id: String = row.try_get("organization_id")?;
        let is_school: bool = row.try_get("is_school")?;
        let scope = if is_school {
            TemplateScope::School { organization_id }
        } else {
            TemplateScope::Classroom {
                organization_id,
                classroom_id: row.try_get("classroom_id")?,
            }
        };

        Ok(Some(ReportPlanTemplate {
            id: row.try_get("id")?,
            key: TemplateKey {
                scope,
                topic_id: key.topic_id.clone(),
                term_id: key.term_id.clone(),
                language: key.language.clone(),
            },
            content: TemplateContent {
                title: row.try_get("title")?,
                introduction: row.try_get("introduction")?,
                curriculum_area: row.try_get("curriculum_area")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}
