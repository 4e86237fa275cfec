use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Mean progress scores of one topic over the reports absorbed for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicAggregate {
    pub topic_id: Id,
    #[serde(default)]
    pub topic_title: String,
    #[serde(default)]
    pub topic_main_image_url: String,
    pub mean_before: f64,
    pub mean_now: f64,
    pub mean_conclusion: f64,
    pub mean_status: f64,
    pub mean_percentage: f64,
    pub sample_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassroomOverview {
    pub classroom_id: Id,
    pub classroom_name: String,
    /// Sum of the topics' `mean_percentage`, not their average.
    pub average_topics_percentage: f64,
    pub topics: Vec<TopicAggregate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolOverview {
    /// Sum of the classrooms' `average_topics_percentage`.
    pub overall_classes_percentage: f64,
    pub classes: Vec<ClassroomOverview>,
}

/// Summary shown above a classroom's report listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub before: f64,
    pub now: f64,
    pub conclusion: f64,
    pub main_percentage: f64,
}

/// A section still waiting on the teacher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenTask {
    pub term_title: String,
    pub topic_title: String,
    pub student_name: String,
    pub language: String,
    pub task: String,
    pub status: String,
}
