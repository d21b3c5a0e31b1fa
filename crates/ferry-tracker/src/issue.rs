//! Issue entity and the records hanging off it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{IssueChange, IssueComment, IssueSetting, User};

/// Summary of the most recent activity on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdate {
    /// Activity label, e.g. "Opened".
    pub activity: String,
    /// User who performed it.
    pub user: User,
    /// When it happened.
    pub date: DateTime<Utc>,
}

/// Association of an issue with a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSchedule {
    /// Milestone name.
    pub milestone: String,
}

/// A single custom field value of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueField {
    /// Field name.
    pub name: String,
    /// Field value, `None` when empty.
    pub value: Option<String>,
}

/// An issue in the target tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier within the store (0 until saved).
    pub id: u64,
    /// Owning project.
    pub project: String,
    /// Issue number within the project (#1, #2, etc.).
    pub number: u64,
    /// Title of the issue.
    pub title: String,
    /// Description (Markdown).
    pub description: Option<String>,
    /// Lifecycle state name.
    pub state: String,
    /// User who submitted the issue.
    pub submitter: User,
    /// When the issue was submitted.
    pub submit_date: DateTime<Utc>,
    /// Most recent activity.
    pub last_update: Option<LastUpdate>,
    /// Custom field values by field name.
    pub fields: BTreeMap<String, Option<String>>,
    /// Milestones the issue is scheduled into.
    pub schedules: Vec<IssueSchedule>,
    /// Comments in chronological order.
    pub comments: Vec<IssueComment>,
    /// Number of comments.
    pub comment_count: usize,
    /// Change history in chronological order.
    pub changes: Vec<IssueChange>,
}

impl Issue {
    /// Creates a new issue submitted by the unknown user.
    pub fn new(project: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            project: project.into(),
            number: 0,
            title: title.into(),
            description: None,
            state: String::new(),
            submitter: User::unknown(),
            submit_date: Utc::now(),
            last_update: None,
            fields: BTreeMap::new(),
            schedules: Vec::new(),
            comments: Vec::new(),
            comment_count: 0,
            changes: Vec::new(),
        }
    }

    /// Sets every field declared in `setting` to empty.
    pub fn init_fields(&mut self, setting: &IssueSetting) {
        for spec in setting.field_specs() {
            self.fields.insert(spec.name.clone(), None);
        }
    }

    /// Sets a field value.
    pub fn set_field_value(&mut self, name: impl Into<String>, value: Option<String>) {
        self.fields.insert(name.into(), value);
    }

    /// Returns the value of a field, if set.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }

    /// Returns true if the field is present, empty or not.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field values as persistable records.
    pub fn field_records(&self) -> Vec<IssueField> {
        self.fields
            .iter()
            .map(|(name, value)| IssueField {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Schedules the issue into a milestone.
    pub fn add_schedule(&mut self, milestone: impl Into<String>) {
        let milestone = milestone.into();
        if !self.schedules.iter().any(|s| s.milestone == milestone) {
            self.schedules.push(IssueSchedule { milestone });
        }
    }

    /// Appends a comment and refreshes the comment count.
    pub fn add_comment(&mut self, comment: IssueComment) {
        self.comments.push(comment);
        self.comment_count = self.comments.len();
    }

    /// Appends a change record.
    pub fn add_change(&mut self, change: IssueChange) {
        self.changes.push(change);
    }

    /// Puts `text` in front of the description, separated by a blank line.
    pub fn prepend_description(&mut self, text: &str) {
        self.description = Some(match self.description.take() {
            Some(existing) => format!("{text}\n\n{existing}"),
            None => text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChangeData, FieldSpec};

    fn create_test_issue() -> Issue {
        Issue::new("acme", "Crash on startup")
    }

    #[test]
    fn test_issue_creation() {
        let issue = create_test_issue();
        assert_eq!(issue.title, "Crash on startup");
        assert!(issue.submitter.is_unknown());
        assert!(issue.fields.is_empty());
        assert_eq!(issue.comment_count, 0);
    }

    #[test]
    fn test_init_fields_declares_every_field() {
        let mut setting = IssueSetting::default();
        setting.add_field_spec(FieldSpec::text("Notes")).unwrap();

        let mut issue = create_test_issue();
        issue.init_fields(&setting);

        for spec in setting.field_specs() {
            assert!(issue.has_field(&spec.name), "missing {}", spec.name);
            assert_eq!(issue.field_value(&spec.name), None);
        }

        issue.set_field_value("Type", Some("Bug".to_string()));
        assert_eq!(issue.field_value("Type"), Some("Bug"));
        assert_eq!(issue.field_records().len(), setting.field_specs().len());
    }

    #[test]
    fn test_comment_count_tracks_comments() {
        let mut issue = create_test_issue();
        let now = Utc::now();
        issue.add_comment(IssueComment::new(User::unknown(), now, "first"));
        issue.add_comment(IssueComment::new(User::unknown(), now, "second"));
        assert_eq!(issue.comment_count, 2);
    }

    #[test]
    fn test_schedules_are_unique() {
        let mut issue = create_test_issue();
        issue.add_schedule("v1.0");
        issue.add_schedule("v1.0");
        assert_eq!(issue.schedules.len(), 1);
    }

    #[test]
    fn test_prepend_description() {
        let mut issue = create_test_issue();
        issue.prepend_description("|Type|\n|---|\n|Support|");
        assert_eq!(issue.description.as_deref(), Some("|Type|\n|---|\n|Support|"));

        let mut issue = create_test_issue();
        issue.description = Some("Steps to reproduce".to_string());
        issue.prepend_description("|Type|");
        assert_eq!(
            issue.description.as_deref(),
            Some("|Type|\n\nSteps to reproduce")
        );
    }

    #[test]
    fn test_changes_keep_order() {
        let mut issue = create_test_issue();
        let now = Utc::now();
        for name in ["a", "b"] {
            issue.add_change(IssueChange::new(
                User::unknown(),
                now,
                ChangeData::MilestoneAdd {
                    milestone: name.to_string(),
                },
            ));
        }
        assert_eq!(
            issue.changes[1].data,
            ChangeData::MilestoneAdd {
                milestone: "b".to_string()
            }
        );
    }
}
