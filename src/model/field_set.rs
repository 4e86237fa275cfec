use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::{SectionField, SectionName};

/// A set of individual field assignments against one report.
///
/// Stores must apply the whole set atomically and must never replace a section object
/// wholesale: every assignment names exactly one `sections.<section>.<field>` path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    pub editor_id: Option<String>,
    pub status: Option<String>,
    pub editing: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
    assignments: BTreeMap<(SectionName, SectionField), String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, section: SectionName, field: SectionField, value: impl Into<String>) {
        self.assignments.insert((section, field), value.into());
    }

    pub fn assignments(&self) -> impl Iterator<Item = (SectionName, SectionField, &str)> {
        self.assignments
            .iter()
            .map(|((section, field), value)| (*section, *field, value.as_str()))
    }

    /// Dotted paths of every assignment, top-level fields first.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.assignments.len() + 4);
        if self.editor_id.is_some() {
            paths.push("editor_id".to_string());
        }
        if self.status.is_some() {
            paths.push("status".to_string());
        }
        if self.editing.is_some() {
            paths.push("editing".to_string());
        }
        if self.updated_at.is_some() {
            paths.push("updated_at".to_string());
        }
        paths.extend(
            self.assignments
                .keys()
                .map(|(section, field)| format!("sections.{}.{}", section, field)),
        );
        paths
    }

    /// The section assignments as a two-level JSON object `{section: {field: value}}`.
    ///
    /// Stores merge this object key by key into the existing section map.
    pub fn sections_patch(&self) -> Value {
        let mut patch = Map::new();
        for ((section, field), value) in &self.assignments {
            let entry = patch
                .entry(section.as_str().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(fields) = entry {
                fields.insert(field.as_str().to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths_and_patch() {
        let mut fields = FieldSet::new();
        fields.status = Some("manager".to_string());
        fields.assign(SectionName::Now, SectionField::ManagerComment, "looks good");
        fields.assign(SectionName::Now, SectionField::Status, "manager");
        fields.assign(SectionName::Before, SectionField::ManagerNote, "n");

        assert_eq!(
            fields.paths(),
            vec![
                "status",
                "sections.before.manager_note",
                "sections.now.status",
                "sections.now.manager_comment",
            ]
        );
        assert_eq!(
            fields.sections_patch(),
            json!({
                "before": {"manager_note": "n"},
                "now": {"manager_comment": "looks good", "status": "manager"}
            })
        );
    }

    #[test]
    fn test_empty_field_set() {
        let fields = FieldSet::new();
        assert!(fields.paths().is_empty());
        assert_eq!(fields.sections_patch(), json!({}));
    }
}
