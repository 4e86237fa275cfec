use crate::gateway::{degrade, Gateways};
use crate::model::{
    ManagerPrevious, Report, ReportFilter, ReportIdentity, SectionField, SectionName,
    TeacherPrevious,
};
use crate::store::traits::ReportStore;

/// Previous-term context shown next to a report.
pub struct CarryForwardResolver;

impl CarryForwardResolver {
    /// Look up the same student/topic/language report by the same editor in the previous
    /// term and extract the `now` and `conclusion` comments.
    ///
    /// Never fails: a missing term, missing report or unavailable directory all resolve to
    /// empty values.
    pub async fn resolve<S: ReportStore + ?Sized>(
        store: &S,
        gateways: &Gateways,
        report: &Report,
        organization_id: &str,
    ) -> (ManagerPrevious, TeacherPrevious) {
        let Some(previous_term) =
            degrade(gateways.previous_term(&report.identity.term_id, organization_id).await)
        else {
            return Default::default();
        };

        let identity = ReportIdentity {
            term_id: previous_term.id.clone(),
            ..report.identity.clone()
        };
        let filter = ReportFilter::identity_and_editor(&identity, &report.editor_id);
        let previous = match store.find_many(&filter).await {
            Ok(reports) => reports.into_iter().next(),
            Err(e) => {
                log::warn!("Previous-term lookup for {} failed: {}", identity, e);
                None
            }
        };

        match previous {
            Some(previous) => Self::extract(&previous, &previous_term.title),
            None => Default::default(),
        }
    }

    /// Only `now` and `conclusion` are carried forward.
    pub fn extract(previous: &Report, term_title: &str) -> (ManagerPrevious, TeacherPrevious) {
        let field = |section: SectionName, name: SectionField| {
            previous
                .sections
                .field(section, name)
                .unwrap_or_default()
                .to_string()
        };

        let manager = ManagerPrevious {
            term_title: term_title.to_string(),
            now: field(SectionName::Now, SectionField::ManagerComment),
            now_updated_at: field(SectionName::Now, SectionField::ManagerUpdatedAt),
            conclusion: field(SectionName::Conclusion, SectionField::ManagerComment),
            conclusion_updated_at: field(SectionName::Conclusion, SectionField::ManagerUpdatedAt),
        };
        let teacher = TeacherPrevious {
            term_title: term_title.to_string(),
            now: field(SectionName::Now, SectionField::TeacherReport),
            now_updated_at: field(SectionName::Now, SectionField::UpdatedAt),
            conclusion: field(SectionName::Conclusion, SectionField::TeacherReport),
            conclusion_updated_at: field(SectionName::Conclusion, SectionField::UpdatedAt),
        };
        (manager, teacher)
    }
}
