use chrono::Utc;
use serde::Serialize;

use crate::error::{ReportError, ReportResult};
use crate::gateway::{degrade, Gateways};
use crate::model::{
    FieldSet, Report, ReportFilter, ReportIdentity, ReportPlanTemplate, SectionField,
    SectionName, TemplateContent, TemplateKey, TemplateScope,
};
use crate::store::traits::Store;

/// Result of applying a template to its target reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateApplication {
    pub template: ReportPlanTemplate,
    pub updated: usize,
    /// Targets without a report, or whose report vanished before the write
    pub skipped: usize,
}

/// Stores plan templates and copies their content into matching reports.
pub struct TemplateApplicator;

impl TemplateApplicator {
    /// The static-section assignments a template makes. Nothing else is touched.
    pub fn field_set(content: &TemplateContent) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.assign(SectionName::Title, SectionField::Content, &content.title);
        fields.assign(
            SectionName::Introduction,
            SectionField::Content,
            &content.introduction,
        );
        fields.assign(
            SectionName::CurriculumArea,
            SectionField::Content,
            &content.curriculum_area,
        );
        fields
    }

    /// Upsert a school template and apply it to every report of the term, topic and language.
    pub async fn apply_school_template<S: Store + ?Sized>(
        store: &S,
        term_id: &str,
        topic_id: &str,
        language: &str,
        organization_id: &str,
        content: TemplateContent,
    ) -> ReportResult<TemplateApplication> {
        let scope = TemplateScope::School {
            organization_id: organization_id.to_string(),
        };
        let template = Self::save(store, scope, term_id, topic_id, language, content).await?;

        let targets: Vec<ReportIdentity> = store
            .find_many(&ReportFilter::term_topic_language(term_id, topic_id, language))
            .await?
            .into_iter()
            .map(|report| report.identity)
            .collect();
        if targets.is_empty() {
            return Err(ReportError::not_found(format!(
                "no reports to apply template to for term {} topic {} ({})",
                term_id, topic_id, language
            )));
        }

        Self::apply_to(store, template, targets, 0).await
    }

    /// Upsert a classroom template and apply it to the reports of the students assigned to
    /// the classroom for the term.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_classroom_template<S: Store + ?Sized>(
        store: &S,
        gateways: &Gateways,
        term_id: &str,
        topic_id: &str,
        language: &str,
        organization_id: &str,
        classroom_id: &str,
        content: TemplateContent,
    ) -> ReportResult<TemplateApplication> {
        let scope = TemplateScope::Classroom {
            organization_id: organization_id.to_string(),
            classroom_id: classroom_id.to_string(),
        };
        let template = Self::save(store, scope, term_id, topic_id, language, content).await?;

        let roster = gateways
            .assigned_students(term_id, classroom_id)
            .await?
            .filter(|roster| !roster.students.is_empty())
            .ok_or_else(|| {
                ReportError::not_found(format!(
                    "no students assigned to classroom {} in term {}",
                    classroom_id, term_id
                ))
            })?;

        let mut targets = Vec::with_capacity(roster.students.len());
        let mut missing = 0;
        for student in &roster.students {
            let identity =
                ReportIdentity::new(&student.student_id, topic_id, term_id, language);
            match Self::find_target(store, gateways, &identity, student.teacher_id.as_deref())
                .await?
            {
                Some(report) => targets.push(report.identity),
                None => {
                    log::debug!("No report for {} yet, skipping template", identity);
                    missing += 1;
                }
            }
        }

        Self::apply_to(store, template, targets, missing).await
    }

    /// Upsert the template under its scope key without applying it.
    pub async fn save<S: Store + ?Sized>(
        store: &S,
        scope: TemplateScope,
        term_id: &str,
        topic_id: &str,
        language: &str,
        content: TemplateContent,
    ) -> ReportResult<ReportPlanTemplate> {
        let key = TemplateKey {
            scope,
            topic_id: topic_id.to_string(),
            term_id: term_id.to_string(),
            language: language.to_string(),
        };
        Ok(store
            .upsert_template(ReportPlanTemplate::new(key, content, Utc::now()))
            .await?)
    }

    /// The student's report, written by the assigned teacher when one is named.
    async fn find_target<S: Store + ?Sized>(
        store: &S,
        gateways: &Gateways,
        identity: &ReportIdentity,
        teacher_id: Option<&str>,
    ) -> ReportResult<Option<Report>> {
        let Some(teacher_id) = teacher_id else {
            return Ok(store.find_by_identity(identity).await?);
        };
        let Some(editor) = degrade(gateways.user_by_teacher(teacher_id).await) else {
            log::warn!("Teacher {} has no user account, skipping {}", teacher_id, identity);
            return Ok(None);
        };
        let reports = store
            .find_many(&ReportFilter::identity_and_editor(identity, &editor.id))
            .await?;
        Ok(reports.into_iter().next())
    }

    async fn write<S: Store + ?Sized>(
        store: &S,
        identity: &ReportIdentity,
        fields: &FieldSet,
    ) -> ReportResult<()> {
        let result = store.upsert_fields(identity, fields, false).await?;
        if result.matched_count == 0 {
            return Err(ReportError::not_found(format!("report {}", identity)));
        }
        Ok(())
    }

    async fn apply_to<S: Store + ?Sized>(
        store: &S,
        template: ReportPlanTemplate,
        targets: Vec<ReportIdentity>,
        already_skipped: usize,
    ) -> ReportResult<TemplateApplication> {
        let fields = Self::field_set(&template.content);
        let mut updated = 0;
        let mut skipped = already_skipped;

        for identity in &targets {
            match Self::write(store, identity, &fields).await {
                Ok(()) => updated += 1,
                Err(e) if e.is_not_found() => {
                    log::warn!("Skipping template {} for {}: {}", template.id, identity, e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Applied template {} to {} report(s), skipped {}",
            template.id,
            updated,
            skipped
        );
        Ok(TemplateApplication {
            template,
            updated,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ClassroomEntry, DirectoryFixture, StaticDirectory};
    use crate::model::{AssignedStudent, ClassroomRoster, Sections, TeacherInfo};
    use crate::store::{InMemoryStore, ReportStore, TemplateStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn content() -> TemplateContent {
        TemplateContent {
            title: "Water".to_string(),
            introduction: "We explore water".to_string(),
            curriculum_area: "Science".to_string(),
        }
    }

    fn report(student: &str, editor: &str) -> Report {
        let mut report = Report::new(ReportIdentity::new(student, "t1", "tm1", "en"), Utc::now());
        report.editor_id = editor.to_string();
        report.sections =
            Sections::new().with(SectionName::Now, SectionField::TeacherReport, "draft");
        report
    }

    fn gateways() -> Gateways {
        let student = |id: &str| AssignedStudent {
            student_id: id.to_string(),
            teacher_id: Some("tch1".to_string()),
            ..Default::default()
        };
        let fixture = DirectoryFixture {
            teachers: vec![TeacherInfo {
                id: "tch1".to_string(),
                user_id: "u1".to_string(),
                organization_id: "org".to_string(),
                name: "Lan".to_string(),
                avatar_url: None,
            }],
            classrooms: vec![ClassroomEntry {
                term_id: "tm1".to_string(),
                roster: ClassroomRoster {
                    classroom_id: "c1".to_string(),
                    classroom_name: "Sunflowers".to_string(),
                    icon_url: None,
                    students: vec![student("s1"), student("s2"), student("s3")],
                },
            }],
            ..Default::default()
        };
        Gateways::from_directory(
            Arc::new(StaticDirectory::new(fixture)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_classroom_template_skips_students_without_reports() {
        let store = InMemoryStore::new();
        store.put_report(report("s1", "u1"));
        store.put_report(report("s2", "u1"));

        let applied = TemplateApplicator::apply_classroom_template(
            &store,
            &gateways(),
            "tm1",
            "t1",
            "en",
            "org",
            "c1",
            content(),
        )
        .await
        .unwrap();

        assert_eq!(applied.updated, 2);
        assert_eq!(applied.skipped, 1);
        assert_eq!(store.report_count(), 2);

        let s1 = store
            .find_by_identity(&ReportIdentity::new("s1", "t1", "tm1", "en"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            s1.sections.field(SectionName::Title, SectionField::Content),
            Some("Water")
        );
        assert_eq!(
            s1.sections.field(SectionName::CurriculumArea, SectionField::Content),
            Some("Science")
        );
        assert_eq!(
            s1.sections.field(SectionName::Now, SectionField::TeacherReport),
            Some("draft")
        );
    }

    #[tokio::test]
    async fn test_classroom_template_matches_the_assigned_teacher() {
        let store = InMemoryStore::new();
        store.put_report(report("s1", "someone-else"));

        let applied = TemplateApplicator::apply_classroom_template(
            &store,
            &gateways(),
            "tm1",
            "t1",
            "en",
            "org",
            "c1",
            content(),
        )
        .await
        .unwrap();
        assert_eq!(applied.updated, 0);
        assert_eq!(applied.skipped, 3);
    }

    #[tokio::test]
    async fn test_unknown_classroom_is_not_found() {
        let store = InMemoryStore::new();
        let err = TemplateApplicator::apply_classroom_template(
            &store,
            &gateways(),
            "tm1",
            "t1",
            "en",
            "org",
            "nope",
            content(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_school_template_without_reports_is_not_found_but_saved() {
        let store = InMemoryStore::new();
        let err = TemplateApplicator::apply_school_template(
            &store, "tm1", "t1", "en", "org", content(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());

        let key = TemplateKey {
            scope: TemplateScope::School {
                organization_id: "org".to_string(),
            },
            topic_id: "t1".to_string(),
            term_id: "tm1".to_string(),
            language: "en".to_string(),
        };
        assert!(store.find_template(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_school_template_reapplies_idempotently() {
        let store = InMemoryStore::new();
        store.put_report(report("s1", "u1"));
        store.put_report(report("s2", "u2"));
        let mut other_language = report("s3", "u1");
        other_language.identity.language = "vi".to_string();
        store.put_report(other_language);

        let first = TemplateApplicator::apply_school_template(
            &store, "tm1", "t1", "en", "org", content(),
        )
        .await
        .unwrap();
        let second = TemplateApplicator::apply_school_template(
            &store, "tm1", "t1", "en", "org", content(),
        )
        .await
        .unwrap();

        assert_eq!(first.updated, 2);
        assert_eq!(second.updated, 2);
        assert_eq!(first.template.id, second.template.id);
    }
}
