use std::collections::{BTreeMap, HashMap};

use crate::logic::status_scale::StatusScale;
use crate::model::{
    ClassroomOverview, Id, Report, ReportSummary, SchoolOverview, SectionName, Topic,
    TopicAggregate,
};

/// Statuses that leave a section on the teacher's to-do list.
pub const OPEN_TASK_STATUSES: [&str; 2] = ["teacher", "empty"];

/// Weighted running mean. Absorbing samples one by one and merging partial means give the
/// same result up to floating-point rounding, whatever the order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    pub mean: f64,
    pub count: u64,
}

impl RunningMean {
    pub fn absorb(&mut self, value: f64) {
        let n = self.count as f64;
        self.mean = (self.mean * n + value) / (n + 1.0);
        self.count += 1;
    }

    pub fn merge(&mut self, other: &RunningMean) {
        if other.count == 0 {
            return;
        }
        let total = self.count + other.count;
        self.mean = (self.mean * self.count as f64 + other.mean * other.count as f64)
            / total as f64;
        self.count = total;
    }
}

/// Scores of one report, as fed into the topic means.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressObservation {
    pub before: f64,
    pub now: f64,
    pub conclusion: f64,
    /// Score of the report's top-level status
    pub main_status: f64,
}

impl ProgressObservation {
    pub fn percentage(&self) -> f64 {
        self.before + self.now + self.conclusion + self.main_status
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopicAccumulator {
    pub before: RunningMean,
    pub now: RunningMean,
    pub conclusion: RunningMean,
    pub main_status: RunningMean,
    pub main_percentage: RunningMean,
}

impl TopicAccumulator {
    pub fn absorb(&mut self, observation: &ProgressObservation) {
        self.before.absorb(observation.before);
        self.now.absorb(observation.now);
        self.conclusion.absorb(observation.conclusion);
        self.main_status.absorb(observation.main_status);
        self.main_percentage.absorb(observation.percentage());
    }

    pub fn merge(&mut self, other: &TopicAccumulator) {
        self.before.merge(&other.before);
        self.now.merge(&other.now);
        self.conclusion.merge(&other.conclusion);
        self.main_status.merge(&other.main_status);
        self.main_percentage.merge(&other.main_percentage);
    }

    pub fn count(&self) -> u64 {
        self.main_percentage.count
    }

    pub fn to_aggregate(&self, topic_id: &str, topic: Option<&Topic>) -> TopicAggregate {
        TopicAggregate {
            topic_id: topic_id.to_string(),
            topic_title: topic.map(|t| t.title.clone()).unwrap_or_default(),
            topic_main_image_url: topic.map(|t| t.main_image_url.clone()).unwrap_or_default(),
            mean_before: self.before.mean,
            mean_now: self.now.mean,
            mean_conclusion: self.conclusion.mean,
            mean_status: self.main_status.mean,
            mean_percentage: self.main_percentage.mean,
            sample_count: self.count(),
        }
    }
}

/// Partial per-topic means, keyed by topic id.
pub type TopicGroups = BTreeMap<Id, TopicAccumulator>;

/// Progress scoring and roll-ups over reports.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    scale: StatusScale,
}

impl AggregationEngine {
    pub fn new(scale: StatusScale) -> Self {
        Self { scale }
    }

    fn section_score(&self, report: &Report, section: SectionName) -> u32 {
        self.scale.score_opt(report.sections.status_of(section))
    }

    /// Sum of the `before`, `now` and `conclusion` status scores.
    pub fn progress(&self, report: &Report) -> u32 {
        self.section_score(report, SectionName::Before)
            + self.section_score(report, SectionName::Now)
            + self.section_score(report, SectionName::Conclusion)
    }

    pub fn observe(&self, report: &Report) -> ProgressObservation {
        ProgressObservation {
            before: self.section_score(report, SectionName::Before) as f64,
            now: self.section_score(report, SectionName::Now) as f64,
            conclusion: self.section_score(report, SectionName::Conclusion) as f64,
            main_status: self.scale.score(&report.status) as f64,
        }
    }

    pub fn group_by_topic<'a>(&self, reports: impl IntoIterator<Item = &'a Report>) -> TopicGroups {
        let mut groups = TopicGroups::new();
        for report in reports {
            groups
                .entry(report.identity.topic_id.clone())
                .or_default()
                .absorb(&self.observe(report));
        }
        groups
    }

    pub fn merge_topic_groups(into: &mut TopicGroups, other: &TopicGroups) {
        for (topic_id, accumulator) in other {
            into.entry(topic_id.clone()).or_default().merge(accumulator);
        }
    }

    /// One aggregate per topic, ordered by topic id.
    pub fn topic_aggregates(
        &self,
        groups: &TopicGroups,
        topics: &HashMap<Id, Topic>,
    ) -> Vec<TopicAggregate> {
        groups
            .iter()
            .filter(|(_, accumulator)| accumulator.count() > 0)
            .map(|(topic_id, accumulator)| accumulator.to_aggregate(topic_id, topics.get(topic_id)))
            .collect()
    }

    /// Rolls topic aggregates up into a classroom. The classroom figure is the sum of its
    /// topics' `mean_percentage`.
    pub fn classroom_overview(
        &self,
        classroom_id: &str,
        classroom_name: &str,
        topics: Vec<TopicAggregate>,
    ) -> ClassroomOverview {
        ClassroomOverview {
            classroom_id: classroom_id.to_string(),
            classroom_name: classroom_name.to_string(),
            average_topics_percentage: topics.iter().map(|t| t.mean_percentage).sum(),
            topics,
        }
    }

    /// The school figure is the sum of the classroom figures.
    pub fn school_overview(&self, classes: Vec<ClassroomOverview>) -> SchoolOverview {
        SchoolOverview {
            overall_classes_percentage: classes.iter().map(|c| c.average_topics_percentage).sum(),
            classes,
        }
    }

    /// Mean section scores over a classroom listing.
    pub fn summarize<'a>(&self, reports: impl IntoIterator<Item = &'a Report>) -> ReportSummary {
        let mut before = RunningMean::default();
        let mut now = RunningMean::default();
        let mut conclusion = RunningMean::default();
        for report in reports {
            let observation = self.observe(report);
            before.absorb(observation.before);
            now.absorb(observation.now);
            conclusion.absorb(observation.conclusion);
        }

        ReportSummary {
            before: before.mean,
            now: now.mean,
            conclusion: conclusion.mean,
            main_percentage: before.mean + now.mean + conclusion.mean,
        }
    }

    /// Sections of a report still waiting on its teacher, with their status.
    pub fn open_task_sections<'r>(&self, report: &'r Report) -> Vec<(SectionName, &'r str)> {
        report
            .sections
            .iter()
            .filter_map(|(name, section)| {
                section
                    .status()
                    .filter(|status| OPEN_TASK_STATUSES.contains(status))
                    .map(|status| (*name, status))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReportIdentity, SectionField, Sections};
    use chrono::Utc;
    use itertools::Itertools;

    const LABELS: [&str; 7] = ["empty", "teacher", "manager", "done", "approved", "Done", ""];

    fn report(topic: &str, student: &str, statuses: [&str; 3], main: &str) -> Report {
        let mut report = Report::new(ReportIdentity::new(student, topic, "tm1", "en"), Utc::now());
        report.status = main.to_string();
        report.sections = Sections::new()
            .with(SectionName::Before, SectionField::Status, statuses[0])
            .with(SectionName::Now, SectionField::Status, statuses[1])
            .with(SectionName::Conclusion, SectionField::Status, statuses[2]);
        report
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    fn assert_groups_close(a: &TopicGroups, b: &TopicGroups) {
        assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
        for (topic, left) in a {
            let right = &b[topic];
            assert_eq!(left.count(), right.count());
            assert_close(left.before.mean, right.before.mean);
            assert_close(left.now.mean, right.now.mean);
            assert_close(left.conclusion.mean, right.conclusion.mean);
            assert_close(left.main_status.mean, right.main_status.mean);
            assert_close(left.main_percentage.mean, right.main_percentage.mean);
        }
    }

    #[test]
    fn test_progress_stays_within_bounds() {
        let engine = AggregationEngine::default();
        for statuses in LABELS.iter().copied().combinations_with_replacement(3) {
            let report = report("t1", "s1", [statuses[0], statuses[1], statuses[2]], "");
            let progress = engine.progress(&report);
            assert!(progress <= 75, "{:?} scored {}", statuses, progress);
        }

        let full = report("t1", "s1", ["approved", "approved", "approved"], "approved");
        assert_eq!(engine.progress(&full), 75);

        let bare = Report::new(ReportIdentity::new("s1", "t1", "tm1", "en"), Utc::now());
        assert_eq!(engine.progress(&bare), 0);
    }

    #[test]
    fn test_absorb_order_does_not_matter() {
        let engine = AggregationEngine::default();
        let reports = vec![
            report("t1", "s1", ["done", "teacher", "empty"], "manager"),
            report("t1", "s2", ["approved", "manager", "done"], "done"),
            report("t2", "s1", ["teacher", "teacher", "teacher"], "teacher"),
            report("t1", "s3", ["empty", "empty", "approved"], ""),
            report("t2", "s4", ["manager", "done", "unknown"], "approved"),
        ];

        let expected = engine.group_by_topic(&reports);
        for order in reports.iter().permutations(reports.len()) {
            let groups = engine.group_by_topic(order);
            assert_groups_close(&groups, &expected);
        }

        let t1 = &expected["t1"];
        assert_eq!(t1.count(), 3);
        assert_close(t1.before.mean, (20.0 + 25.0 + 0.0) / 3.0);
        assert_close(t1.main_percentage.mean, (45.0 + 80.0 + 25.0) / 3.0);
    }

    #[test]
    fn test_partition_and_merge_order_do_not_matter() {
        let engine = AggregationEngine::default();
        let reports = vec![
            report("t1", "s1", ["done", "teacher", "empty"], "manager"),
            report("t1", "s2", ["approved", "manager", "done"], "done"),
            report("t2", "s1", ["teacher", "teacher", "teacher"], "teacher"),
            report("t1", "s3", ["empty", "empty", "approved"], ""),
            report("t2", "s4", ["manager", "done", "done"], "approved"),
            report("t1", "s5", ["manager", "manager", "manager"], "manager"),
        ];
        let expected = engine.group_by_topic(&reports);

        for split in [1, 2, 4] {
            let partials: Vec<TopicGroups> = reports
                .chunks(split)
                .map(|chunk| engine.group_by_topic(chunk))
                .collect();

            for order in partials.iter().permutations(partials.len()).take(120) {
                let mut merged = TopicGroups::new();
                for partial in order {
                    AggregationEngine::merge_topic_groups(&mut merged, partial);
                }
                assert_groups_close(&merged, &expected);
            }
        }
    }

    #[test]
    fn test_roll_ups_sum_child_percentages() {
        let engine = AggregationEngine::default();
        let reports = vec![
            report("t1", "s1", ["done", "done", "done"], "done"),
            report("t2", "s1", ["teacher", "empty", "empty"], ""),
        ];
        let topics = HashMap::from([(
            "t1".to_string(),
            Topic {
                id: "t1".to_string(),
                title: "Water".to_string(),
                main_image_url: "water.png".to_string(),
            },
        )]);

        let aggregates = engine.topic_aggregates(&engine.group_by_topic(&reports), &topics);
        assert_eq!(aggregates[0].topic_title, "Water");
        assert_eq!(aggregates[1].topic_title, "");

        let classroom = engine.classroom_overview("c1", "Sunflowers", aggregates);
        assert_close(classroom.average_topics_percentage, 80.0 + 10.0);

        let school = engine.school_overview(vec![classroom.clone(), classroom]);
        assert_close(school.overall_classes_percentage, 180.0);
    }

    #[test]
    fn test_summary_and_open_tasks() {
        let engine = AggregationEngine::default();
        let reports = vec![
            report("t1", "s1", ["done", "teacher", "empty"], ""),
            report("t1", "s2", ["approved", "manager", "teacher"], ""),
        ];

        let summary = engine.summarize(&reports);
        assert_close(summary.before, 22.5);
        assert_close(summary.now, 12.5);
        assert_close(summary.conclusion, 5.0);
        assert_close(summary.main_percentage, 40.0);
        assert_eq!(engine.summarize(&[]), ReportSummary::default());

        let open = engine.open_task_sections(&reports[0]);
        assert_eq!(
            open,
            vec![(SectionName::Now, "teacher"), (SectionName::Conclusion, "empty")]
        );
    }
}
