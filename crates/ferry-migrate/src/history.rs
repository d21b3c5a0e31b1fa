//! Replay of Redmine journals as target comments and change records.

use chrono::{DateTime, Utc};
use ferry_tracker::{ChangeData, Issue, IssueChange, IssueComment, User};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::source::{JournalDetail, NamedRef, RedmineJournal};
use crate::transform::escape_html;
use crate::types::ImportResult;

/// Id → name tables of the source project, fetched once per run.
#[derive(Debug, Clone, Default)]
pub struct SourceLookups {
    versions: HashMap<String, String>,
    categories: HashMap<String, String>,
    statuses: HashMap<String, String>,
}

impl SourceLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, versions: impl IntoIterator<Item = NamedRef>) -> Self {
        self.versions.extend(versions.into_iter().map(|r| (r.id, r.name)));
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = NamedRef>) -> Self {
        self.categories
            .extend(categories.into_iter().map(|r| (r.id, r.name)));
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = NamedRef>) -> Self {
        self.statuses.extend(statuses.into_iter().map(|r| (r.id, r.name)));
        self
    }

    pub fn version_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.versions.get(id)).map(String::as_str)
    }

    pub fn category_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.categories.get(id)).map(String::as_str)
    }

    pub fn status_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.statuses.get(id)).map(String::as_str)
    }
}

/// Replays the journals of one Redmine issue onto its target issue.
pub struct HistoryReplayer<'a> {
    lookups: &'a SourceLookups,
    category_field: &'a str,
    source_id: u64,
    issue_url: String,
    journals_url: String,
}

impl<'a> HistoryReplayer<'a> {
    /// `issue_url` and `journals_url` are quoted in notes about entries
    /// that cannot be replayed.
    pub fn new(
        lookups: &'a SourceLookups,
        category_field: &'a str,
        source_id: u64,
        issue_url: impl Into<String>,
        journals_url: impl Into<String>,
    ) -> Self {
        Self {
            lookups,
            category_field,
            source_id,
            issue_url: issue_url.into(),
            journals_url: journals_url.into(),
        }
    }

    /// Applies one journal entry written by `user` at `date`.
    pub fn apply(
        &self,
        issue: &mut Issue,
        journal: &RedmineJournal,
        user: &User,
        date: DateTime<Utc>,
        result: &mut ImportResult,
    ) {
        if let Some(notes) = journal.notes.as_deref().filter(|n| !n.is_empty()) {
            issue.add_comment(IssueComment::new(user.clone(), date, notes));
        }

        let mut old_fields = BTreeMap::new();
        let mut new_fields = BTreeMap::new();

        for detail in &journal.details {
            if detail.property != "attr" {
                result.add_note(self.unknown_note("Unknown history property", &detail.property));
                continue;
            }

            let data = match detail.name.as_str() {
                "subject" => Some(ChangeData::Title {
                    old: detail.old_value.clone(),
                    new: detail.new_value.clone(),
                }),
                // No description history in the target.
                "description" => None,
                "category_id" => {
                    let old = self.lookups.category_name(detail.old_value.as_deref());
                    let new = self.lookups.category_name(detail.new_value.as_deref());
                    add_field(&mut old_fields, self.category_field, old);
                    add_field(&mut new_fields, self.category_field, new);
                    None
                }
                "fixed_version_id" => self.milestone_change(detail),
                other => {
                    if other == "status_id" {
                        debug!(
                            issue = self.source_id,
                            old = ?self.lookups.status_name(detail.old_value.as_deref()),
                            new = ?self.lookups.status_name(detail.new_value.as_deref()),
                            "Status history is not replayed"
                        );
                    }
                    result.add_note(self.unknown_note("Unknown history property name", other));
                    None
                }
            };

            if let Some(data) = data {
                issue.add_change(IssueChange::new(user.clone(), date, data));
            }
        }

        if !old_fields.is_empty() || !new_fields.is_empty() {
            issue.add_change(IssueChange::new(
                user.clone(),
                date,
                ChangeData::Fields {
                    old: old_fields,
                    new: new_fields,
                },
            ));
        }
    }

    fn milestone_change(&self, detail: &JournalDetail) -> Option<ChangeData> {
        let old = self.lookups.version_name(detail.old_value.as_deref());
        let new = self.lookups.version_name(detail.new_value.as_deref());
        match (old, new) {
            (Some(old), Some(new)) => Some(ChangeData::MilestoneChange {
                old: vec![old.to_string()],
                new: vec![new.to_string()],
            }),
            (None, Some(new)) => Some(ChangeData::MilestoneAdd {
                milestone: new.to_string(),
            }),
            (Some(old), None) => Some(ChangeData::MilestoneRemove {
                milestone: old.to_string(),
            }),
            (None, None) => None,
        }
    }

    fn unknown_note(&self, prefix: &str, name: &str) -> String {
        format!(
            "{prefix} '{}' in Redmine issue <a href=\"{}\">#{}</a> (<a href=\"{}\">JSON</a>)",
            escape_html(name),
            self.issue_url,
            self.source_id,
            self.journals_url
        )
    }
}

fn add_field(fields: &mut BTreeMap<String, Vec<String>>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        fields.insert(name.to_string(), vec![value.to_string()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lookups() -> SourceLookups {
        let named = |id: &str, name: &str| NamedRef {
            id: id.to_string(),
            name: name.to_string(),
        };
        SourceLookups::new()
            .with_versions([named("5", "v1.0"), named("7", "v2.0")])
            .with_categories([named("3", "Docs"), named("4", "Core")])
            .with_statuses([named("1", "New")])
    }

    fn detail(property: &str, name: &str, old: Option<&str>, new: Option<&str>) -> JournalDetail {
        JournalDetail {
            property: property.to_string(),
            name: name.to_string(),
            old_value: old.map(str::to_string),
            new_value: new.map(str::to_string),
        }
    }

    fn journal(notes: Option<&str>, details: Vec<JournalDetail>) -> RedmineJournal {
        RedmineJournal {
            id: 1,
            user: NamedRef {
                id: "alice".to_string(),
                name: "Alice".to_string(),
            },
            notes: notes.map(str::to_string),
            created_on: "2024-01-02T10:00:00Z".to_string(),
            details,
        }
    }

    fn replay(journals: &[RedmineJournal]) -> (Issue, ImportResult) {
        let lookups = lookups();
        let replayer = HistoryReplayer::new(
            &lookups,
            "Category",
            42,
            "https://redmine.test/issues/42",
            "https://redmine.test/issues/42.json?include=journals",
        );
        let mut issue = Issue::new("acme", "Crash");
        let mut result = ImportResult::new();
        for (i, j) in journals.iter().enumerate() {
            let date = Utc.with_ymd_and_hms(2024, 1, 1 + i as u32, 10, 0, 0).unwrap();
            replayer.apply(&mut issue, j, &User::unknown(), date, &mut result);
        }
        (issue, result)
    }

    #[test]
    fn test_notes_become_comments_in_order() {
        let (issue, _) = replay(&[
            journal(Some("first"), vec![]),
            journal(Some(""), vec![]),
            journal(Some("second"), vec![]),
            journal(Some("third"), vec![]),
        ]);

        let contents: Vec<_> = issue.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(issue.comment_count, 3);
        assert!(issue.comments.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_version_change() {
        let (issue, _) = replay(&[journal(
            None,
            vec![detail("attr", "fixed_version_id", Some("5"), Some("7"))],
        )]);

        assert_eq!(
            issue.changes[0].data,
            ChangeData::MilestoneChange {
                old: vec!["v1.0".to_string()],
                new: vec!["v2.0".to_string()],
            }
        );
    }

    #[test]
    fn test_version_add_remove_and_unknown() {
        let (issue, _) = replay(&[journal(
            None,
            vec![
                detail("attr", "fixed_version_id", None, Some("7")),
                detail("attr", "fixed_version_id", Some("5"), None),
                detail("attr", "fixed_version_id", Some("99"), Some("98")),
            ],
        )]);

        let data: Vec<_> = issue.changes.iter().map(|c| c.data.clone()).collect();
        assert_eq!(
            data,
            vec![
                ChangeData::MilestoneAdd {
                    milestone: "v2.0".to_string()
                },
                ChangeData::MilestoneRemove {
                    milestone: "v1.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_category_with_only_new_value() {
        let (issue, _) = replay(&[journal(
            None,
            vec![detail("attr", "category_id", None, Some("3"))],
        )]);

        assert_eq!(issue.changes.len(), 1);
        match &issue.changes[0].data {
            ChangeData::Fields { old, new } => {
                assert!(old.is_empty());
                assert_eq!(new.get("Category"), Some(&vec!["Docs".to_string()]));
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn test_one_field_change_per_entry() {
        let (issue, _) = replay(&[journal(
            Some("moved"),
            vec![
                detail("attr", "subject", Some("Old"), Some("New")),
                detail("attr", "category_id", Some("3"), Some("4")),
                detail("attr", "description", Some("a"), Some("b")),
            ],
        )]);

        assert_eq!(issue.comments.len(), 1);
        assert_eq!(issue.changes.len(), 2);
        assert_eq!(
            issue.changes[0].data,
            ChangeData::Title {
                old: Some("Old".to_string()),
                new: Some("New".to_string())
            }
        );
        assert!(matches!(issue.changes[1].data, ChangeData::Fields { .. }));
    }

    #[test]
    fn test_unknown_properties_become_notes() {
        let (issue, result) = replay(&[journal(
            None,
            vec![
                detail("attr", "status_id", Some("1"), Some("2")),
                detail("cf", "12", None, Some("x")),
                detail("attr", "<done_ratio>", Some("0"), Some("50")),
            ],
        )]);

        assert!(issue.changes.is_empty());
        assert_eq!(result.notes.len(), 3);
        assert_eq!(
            result.notes[0],
            "Unknown history property name 'status_id' in Redmine issue \
             <a href=\"https://redmine.test/issues/42\">#42</a> \
             (<a href=\"https://redmine.test/issues/42.json?include=journals\">JSON</a>)"
        );
        assert!(result.notes[1].starts_with("Unknown history property 'cf' in"));
        assert!(result.notes[2].contains("'&lt;done_ratio&gt;'"));
    }
}
