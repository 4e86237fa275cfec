use std::collections::BTreeMap;

use crate::error::{ReportError, ReportResult};

/// Ordinal scores of the section status labels.
///
/// Labels match exactly (case-sensitive); anything not in the table scores 0.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusScale {
    scores: BTreeMap<String, u32>,
}

impl Default for StatusScale {
    fn default() -> Self {
        Self {
            scores: Self::default_labels(),
        }
    }
}

impl StatusScale {
    pub fn default_labels() -> BTreeMap<String, u32> {
        [
            ("empty", 0),
            ("teacher", 10),
            ("manager", 15),
            ("done", 20),
            ("approved", 25),
        ]
        .into_iter()
        .map(|(label, score)| (label.to_string(), score))
        .collect()
    }

    pub fn from_labels(scores: BTreeMap<String, u32>) -> ReportResult<Self> {
        if scores.is_empty() {
            return Err(ReportError::validation("status scale has no labels"));
        }
        if let Some(label) = scores.keys().find(|label| label.trim().is_empty()) {
            return Err(ReportError::validation(format!(
                "status scale label `{}` is blank",
                label
            )));
        }
        Ok(Self { scores })
    }

    pub fn score(&self, label: &str) -> u32 {
        self.scores.get(label).copied().unwrap_or(0)
    }

    pub fn score_opt(&self, label: Option<&str>) -> u32 {
        label.map_or(0, |label| self.score(label))
    }
}
