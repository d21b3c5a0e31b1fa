//! Structured issue change records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::User;

/// Payload of a single issue change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeData {
    /// The title changed.
    Title {
        /// Previous title.
        old: Option<String>,
        /// New title.
        new: Option<String>,
    },
    /// The issue was scheduled into a milestone.
    MilestoneAdd {
        /// Milestone name.
        milestone: String,
    },
    /// The issue was removed from a milestone.
    MilestoneRemove {
        /// Milestone name.
        milestone: String,
    },
    /// The issue moved between milestones.
    MilestoneChange {
        /// Milestones before the change.
        old: Vec<String>,
        /// Milestones after the change.
        new: Vec<String>,
    },
    /// One or more custom fields changed.
    Fields {
        /// Field values before the change, by field name.
        old: BTreeMap<String, Vec<String>>,
        /// Field values after the change, by field name.
        new: BTreeMap<String, Vec<String>>,
    },
}

impl ChangeData {
    /// Short activity description, as shown in the issue's last update.
    pub fn activity(&self) -> String {
        match self {
            ChangeData::Title { .. } => "changed title".to_string(),
            ChangeData::MilestoneAdd { milestone } => {
                format!("added to milestone \"{milestone}\"")
            }
            ChangeData::MilestoneRemove { milestone } => {
                format!("removed from milestone \"{milestone}\"")
            }
            ChangeData::MilestoneChange { .. } => "changed milestone".to_string(),
            ChangeData::Fields { old, new } => {
                let mut names: Vec<&str> = old.keys().chain(new.keys()).map(String::as_str).collect();
                names.sort_unstable();
                names.dedup();
                if names.len() == 1 {
                    format!("changed \"{}\"", names[0])
                } else {
                    "changed fields".to_string()
                }
            }
        }
    }
}

impl std::fmt::Display for ChangeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.activity())
    }
}

/// A timestamped, attributed change to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueChange {
    /// Unique identifier (0 until persisted).
    pub id: u64,
    /// User who made the change.
    pub user: User,
    /// When the change was made.
    pub date: DateTime<Utc>,
    /// What changed.
    pub data: ChangeData,
}

impl IssueChange {
    /// Creates a new change record.
    pub fn new(user: User, date: DateTime<Utc>, data: ChangeData) -> Self {
        Self {
            id: 0,
            user,
            date,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity() {
        let add = ChangeData::MilestoneAdd {
            milestone: "v2.0".to_string(),
        };
        assert_eq!(add.activity(), "added to milestone \"v2.0\"");

        let mut new = BTreeMap::new();
        new.insert("Category".to_string(), vec!["Docs".to_string()]);
        let fields = ChangeData::Fields {
            old: BTreeMap::new(),
            new,
        };
        assert_eq!(fields.to_string(), "changed \"Category\"");
    }

    #[test]
    fn test_change_data_serialization() {
        let data = ChangeData::MilestoneChange {
            old: vec!["v1.0".to_string()],
            new: vec!["v2.0".to_string()],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "milestone_change");
        assert_eq!(json["old"][0], "v1.0");
    }
}
