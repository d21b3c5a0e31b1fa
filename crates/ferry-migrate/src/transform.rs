//! Conversion of one Redmine issue into a target issue.

use ferry_tracker::{Issue, IssueSetting, LastUpdate, TrackerStore};
use std::collections::HashSet;
use tracing::debug;

use crate::client::RedmineClient;
use crate::error::Result;
use crate::history::{HistoryReplayer, SourceLookups};
use crate::importer::RunState;
use crate::mapping::Mappings;
use crate::source::{parse_timestamp, JournalsEnvelope, RedmineIssue};
use crate::types::ImportOption;

/// Everything an issue conversion reads but never changes.
pub struct IssueTransformer<'a> {
    pub client: &'a RedmineClient,
    pub store: &'a dyn TrackerStore,
    pub setting: &'a IssueSetting,
    pub option: &'a ImportOption,
    pub mappings: &'a Mappings,
    pub lookups: &'a SourceLookups,
    /// Names of the target project's milestones.
    pub milestones: &'a HashSet<String>,
    /// Target project.
    pub project: &'a str,
    /// State given to issues whose status is unmapped.
    pub initial_state: &'a str,
}

impl IssueTransformer<'_> {
    /// Builds the target issue for `source`, including its history.
    ///
    /// Records the number assignment in `state` and reports anything that
    /// could not be mapped into `state.result`.
    pub async fn transform(&self, source: &RedmineIssue, state: &mut RunState) -> Result<Issue> {
        let mut extra_info: Vec<(&str, String)> = Vec::new();

        let mut issue = Issue::new(self.project, source.subject.as_str());
        issue.init_fields(self.setting);
        issue.description = source.description.clone();

        issue.number = if self.option.dry_run || self.option.use_existing_numbers {
            source.id
        } else {
            self.store.next_issue_number(self.project).await?
        };
        state.numbers.insert(source.id, issue.number);

        issue.state = self
            .mappings
            .status
            .resolve(&source.status.name)
            .cloned()
            .unwrap_or_else(|| self.initial_state.to_string());

        if let Some(version) = &source.fixed_version {
            if self.milestones.contains(&version.name) {
                issue.add_schedule(version.name.as_str());
            } else {
                extra_info.push(("Milestone", version.name.clone()));
                state.result.unresolved_milestones.insert(version.name.clone());
            }
        }

        issue.submitter = state
            .identities
            .resolve_or_unknown(
                self.client,
                self.store,
                &source.author.id,
                &source.author.name,
                &mut state.result.unresolved_logins,
            )
            .await?;
        issue.submit_date = parse_timestamp(&source.created_on)?;
        issue.last_update = Some(LastUpdate {
            activity: "Opened".to_string(),
            user: issue.submitter.clone(),
            date: issue.submit_date,
        });

        if let Some(tracker) = &source.tracker {
            match self.mappings.tracker.resolve(&tracker.name) {
                Some(assignment) => {
                    issue.set_field_value(assignment.field.as_str(), Some(assignment.value.clone()))
                }
                None => {
                    let escaped = escape_html(&tracker.name);
                    extra_info.push(("Type", escaped.clone()));
                    state.result.unmapped_trackers.insert(escaped);
                }
            }
        }

        if let Some(priority) = &source.priority {
            match self.mappings.priority.resolve(&priority.name) {
                Some(assignment) => {
                    issue.set_field_value(assignment.field.as_str(), Some(assignment.value.clone()))
                }
                None => {
                    extra_info.push(("Priority", escape_html(&priority.name)));
                    state.result.unmapped_priorities.insert(priority.name.clone());
                }
            }
        }

        if let Some(assignee) = &source.assigned_to {
            match state
                .identities
                .resolve(self.client, self.store, &assignee.id)
                .await?
            {
                Some(user) => issue.set_field_value(self.option.assignees_field.as_str(), Some(user.name)),
                None => {
                    state
                        .result
                        .unresolved_logins
                        .insert(format!("{}:{}", assignee.name, assignee.id));
                }
            }
        }

        issue.set_field_value(
            self.option.category_field.as_str(),
            source.category.as_ref().map(|c| c.name.clone()),
        );

        self.replay_history(&mut issue, source.id, state).await?;

        if let Some(table) = render_extra_info(&extra_info) {
            issue.prepend_description(&table);
        }

        debug!(
            source = source.id,
            number = issue.number,
            comments = issue.comment_count,
            changes = issue.changes.len(),
            "Transformed issue"
        );
        Ok(issue)
    }

    async fn replay_history(&self, issue: &mut Issue, id: u64, state: &mut RunState) -> Result<()> {
        let journals_url = self
            .client
            .api_endpoint(&format!("/issues/{id}.json?include=journals"));
        let envelope: JournalsEnvelope = self.client.get(&journals_url).await?;

        let replayer = HistoryReplayer::new(
            self.lookups,
            &self.option.category_field,
            id,
            self.client.api_endpoint(&format!("/issues/{id}")),
            journals_url,
        );

        for journal in &envelope.issue.journals {
            let user = state
                .identities
                .resolve_or_unknown(
                    self.client,
                    self.store,
                    &journal.user.id,
                    &journal.user.name,
                    &mut state.result.unresolved_logins,
                )
                .await?;
            let date = parse_timestamp(&journal.created_on)?;
            replayer.apply(issue, journal, &user, date, &mut state.result);
        }

        Ok(())
    }
}

/// Escapes text for inclusion in Markdown/HTML output.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Renders attributes without a target counterpart as a Markdown table.
fn render_extra_info(entries: &[(&str, String)]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut table = String::from("|");
    for (key, _) in entries {
        table.push_str(key);
        table.push('|');
    }
    table.push_str("\n|");
    for _ in entries {
        table.push_str("---|");
    }
    table.push_str("\n|");
    for (_, value) in entries {
        table.push_str(value);
        table.push('|');
    }
    Some(table)
}
