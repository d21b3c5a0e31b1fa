//! Orchestration of a Redmine project import.

use ferry_tracker::{FieldSpec, Issue, Milestone, TrackerStore};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ImportServer, RedmineClient};
use crate::error::{MigrationError, Result};
use crate::history::SourceLookups;
use crate::identity::IdentityCache;
use crate::mapping::{MappingTable, Mappings};
use crate::paginate::Pages;
use crate::progress::{ImportPhase, MigrationProgress};
use crate::renumber::{NumberMapping, Renumberer};
use crate::source::{parse_date, project_id, NamedRef, RedmineIssue, RedmineVersion, WikiEnvelope};
use crate::transform::IssueTransformer;
use crate::types::{ImportOption, ImportResult};

/// Empty-value label of the generated category field.
const UNDEFINED_CATEGORY: &str = "Undefined";

/// Mutable state owned by one issue import.
#[derive(Debug, Default)]
pub struct RunState {
    /// Resolved Redmine accounts.
    pub identities: IdentityCache,
    /// Assigned issue numbers.
    pub numbers: NumberMapping,
    /// Accumulated result.
    pub result: ImportResult,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Imports Redmine projects into a tracker store.
pub struct RedmineImporter {
    server: ImportServer,
    store: Arc<dyn TrackerStore>,
    progress: MigrationProgress,
    cancel: CancellationToken,
}

impl RedmineImporter {
    /// Create an importer reading from `server` and writing to `store`.
    pub fn new(server: ImportServer, store: Arc<dyn TrackerStore>) -> Self {
        Self {
            server,
            store,
            progress: MigrationProgress::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set a progress tracker.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Abort with [`MigrationError::Interrupted`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    async fn list<T: DeserializeOwned>(
        &self,
        client: &RedmineClient,
        path: &str,
        collection: &str,
    ) -> Result<Vec<T>> {
        Pages::new(client, &client.api_endpoint(path), collection)?
            .with_cancellation(self.cancel.clone())
            .collect_all()
            .await
    }

    /// Build import options from the server's statuses, trackers and
    /// priorities, with every value mapped to its default.
    pub async fn build_import_option(&self) -> Result<ImportOption> {
        self.progress.set_phase(ImportPhase::BuildingOptions, 3);
        let setting = self.store.issue_setting().await?;
        let client = self.server.new_client()?;

        let statuses: Vec<NamedRef> = self
            .list(&client, "/issue_statuses.json", "issue_statuses")
            .await?;
        self.progress.increment(Some("statuses"));

        let trackers: Vec<NamedRef> = self.list(&client, "/trackers.json", "trackers").await?;
        self.progress.increment(Some("trackers"));

        let priorities: Vec<NamedRef> = self
            .list(&client, "/enumerations/issue_priorities.json", "issue_priorities")
            .await?;
        self.progress.increment(Some("priorities"));

        Ok(ImportOption {
            status_mappings: MappingTable::with_defaults(statuses.into_iter().map(|s| s.name), &setting),
            tracker_mappings: MappingTable::with_defaults(trackers.into_iter().map(|t| t.name), &setting),
            priority_mappings: MappingTable::with_defaults(
                priorities.into_iter().map(|p| p.name),
                &setting,
            ),
            ..ImportOption::default()
        })
    }

    /// Create a milestone for every version of `project` that `target` does
    /// not have yet.
    ///
    /// The version's wiki page, if any, is appended to the description.
    /// Returns the new milestones; in a dry run they are not saved.
    pub async fn import_versions(
        &self,
        project: &str,
        target: &str,
        dry_run: bool,
    ) -> Result<Vec<Milestone>> {
        let client = self.server.new_client()?;
        let id = project_id(project);

        info!("Importing versions from project {project}...");
        let existing: HashSet<String> = self
            .store
            .milestones(target)
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect();

        let versions: Vec<RedmineVersion> = self
            .list(&client, &format!("/projects/{id}/versions.json"), "versions")
            .await?;
        self.progress
            .set_phase(ImportPhase::ImportingVersions, versions.len() as u64);

        let mut milestones = Vec::new();
        for version in versions {
            self.progress.increment(Some(version.name.as_str()));
            if existing.contains(&version.name) {
                debug!(milestone = %version.name, "Milestone already exists");
                continue;
            }

            let closed = version.is_closed();
            let page_id = version.wiki_page_id();

            let mut milestone = Milestone::new(target, version.name);
            milestone.description = version.description.filter(|d| !d.is_empty());
            milestone.due_date = version
                .due_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(parse_date)
                .transpose()?;
            milestone.closed = closed;

            if let Some(text) = self.wiki_text(&client, id, &page_id).await? {
                milestone.append_description(&text);
            }

            let milestone = if dry_run {
                milestone
            } else {
                self.store.save_milestone(milestone).await?
            };
            milestones.push(milestone);
        }

        info!("Imported {} versions", milestones.len());
        Ok(milestones)
    }

    async fn wiki_text(
        &self,
        client: &RedmineClient,
        project_id: &str,
        page_id: &str,
    ) -> Result<Option<String>> {
        let endpoint = client.api_endpoint(&format!("/projects/{project_id}/wiki/{page_id}.json"));
        match client.get::<WikiEnvelope>(&endpoint).await {
            Ok(envelope) => Ok(envelope.wiki_page.text.filter(|t| !t.is_empty())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a choice field holding the project's categories.
    ///
    /// Nothing happens if the issue setting already has a field with the
    /// configured name. Returns the new field; in a dry run it is not saved.
    pub async fn import_categories(
        &self,
        project: &str,
        option: &ImportOption,
        dry_run: bool,
    ) -> Result<Option<FieldSpec>> {
        self.progress.set_phase(ImportPhase::ImportingCategories, 1);
        let mut setting = self.store.issue_setting().await?;
        if setting.field_spec(&option.category_field).is_some() {
            info!("Issue category field '{}' already exists", option.category_field);
            return Ok(None);
        }

        let client = self.server.new_client()?;
        let id = project_id(project);

        info!("Importing issue categories from project {project}...");
        let categories: Vec<NamedRef> = self
            .list(
                &client,
                &format!("/projects/{id}/issue_categories.json"),
                "issue_categories",
            )
            .await?;

        let spec = FieldSpec::choice(
            option.category_field.as_str(),
            categories.into_iter().map(|c| c.name),
        )
        .with_empty_value(UNDEFINED_CATEGORY);

        if !dry_run {
            setting.add_field_spec(spec.clone())?;
            self.store.save_issue_setting(&setting).await?;
        }
        self.progress.increment(Some(option.category_field.as_str()));

        Ok(Some(spec))
    }

    /// Convert every issue of `project` and, unless dry running, save them
    /// into `target`.
    ///
    /// `milestones` are the milestone names issues may be scheduled into.
    pub async fn import_issues(
        &self,
        project: &str,
        target: &str,
        option: &ImportOption,
        milestones: &HashSet<String>,
    ) -> Result<ImportResult> {
        let client = self.server.new_client()?;
        let id = project_id(project);

        let setting = self.store.issue_setting().await?;
        let mappings = Mappings::compile(option, &setting)?;
        let initial_state = setting
            .initial_state()
            .ok_or_else(|| MigrationError::InvalidConfig("issue setting declares no states".to_string()))?;

        let versions: Vec<NamedRef> = self
            .list(&client, &format!("/projects/{id}/versions.json"), "versions")
            .await?;
        let statuses: Vec<NamedRef> = self
            .list(&client, "/issue_statuses.json", "issue_statuses")
            .await?;
        let categories: Vec<NamedRef> = self
            .list(
                &client,
                &format!("/projects/{id}/issue_categories.json"),
                "issue_categories",
            )
            .await?;
        let lookups = SourceLookups::new()
            .with_versions(versions)
            .with_statuses(statuses)
            .with_categories(categories);

        let transformer = IssueTransformer {
            client: &client,
            store: self.store.as_ref(),
            setting: &setting,
            option,
            mappings: &mappings,
            lookups: &lookups,
            milestones,
            project: target,
            initial_state,
        };

        self.progress.set_phase(ImportPhase::ImportingIssues, 0);
        let endpoint = client.api_endpoint(&format!(
            "/issues.json?project_id={id}&status_id=*&sort=id"
        ));
        let mut pages =
            Pages::<RedmineIssue>::new(&client, &endpoint, "issues")?.with_cancellation(self.cancel.clone());

        let mut state = RunState::new();
        let mut issues = Vec::new();
        while let Some(page) = pages.next_page().await? {
            info!("Importing issues from project {project}...");
            self.progress.set_total((issues.len() + page.len()) as u64);
            for source in &page {
                if self.cancel.is_cancelled() {
                    return Err(MigrationError::Interrupted);
                }
                if state.numbers.contains(source.id) {
                    warn!(source = source.id, "Issue listed twice by Redmine, skipping repeat");
                    continue;
                }
                issues.push(transformer.transform(source, &mut state).await?);
                self.progress.increment(Some(format!("#{}", source.id).as_str()));
            }
            info!("Imported {} issues", issues.len());
        }

        let RunState {
            numbers, mut result, ..
        } = state;
        result.issues_processed = issues.len();

        if !option.dry_run {
            self.persist(issues, &numbers).await?;
            result.issues_imported = result.issues_processed > 0;
        }

        Ok(result)
    }

    async fn persist(&self, issues: Vec<Issue>, numbers: &NumberMapping) -> Result<()> {
        self.progress
            .set_phase(ImportPhase::Persisting, issues.len() as u64);
        let renumberer = Renumberer::new(numbers);

        for mut issue in issues {
            if let Some(description) = issue.description.as_mut() {
                renumberer.rewrite_in_place(description);
            }
            for comment in &mut issue.comments {
                renumberer.rewrite_in_place(&mut comment.content);
            }

            let issue_id = self.store.save_issue(&issue).await?;
            for field in issue.field_records() {
                self.store.persist_field(issue_id, &field).await?;
            }
            for schedule in &issue.schedules {
                self.store.persist_schedule(issue_id, schedule).await?;
            }
            for comment in &issue.comments {
                self.store.persist_comment(issue_id, comment).await?;
            }
            for change in &issue.changes {
                self.store.persist_change(issue_id, change).await?;
            }

            debug!(project = %issue.project, number = issue.number, "Saved issue");
            self.progress.increment(Some(format!("#{}", issue.number).as_str()));
        }

        Ok(())
    }

    /// Import `project` into `target`: versions, then categories, then
    /// issues.
    ///
    /// Mapping configuration is validated before anything is written.
    pub async fn run(&self, project: &str, target: &str, option: &ImportOption) -> Result<ImportResult> {
        info!(
            project,
            target,
            dry_run = option.dry_run,
            "Starting Redmine import"
        );
        Mappings::compile(option, &self.store.issue_setting().await?)?;

        let imported = self.import_versions(project, target, option.dry_run).await?;
        self.import_categories(project, option, option.dry_run).await?;

        let mut milestones: HashSet<String> = self
            .store
            .milestones(target)
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect();
        milestones.extend(imported.into_iter().map(|m| m.name));

        let result = self.import_issues(project, target, option, &milestones).await?;

        self.progress.set_phase(ImportPhase::Complete, 0);
        info!(
            issues = result.issues_processed,
            imported = result.issues_imported,
            "Redmine import finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_tracker::{IssueSetting, MemoryStore};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, at: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn importer(server: &MockServer, store: Arc<MemoryStore>) -> RedmineImporter {
        RedmineImporter::new(ImportServer::new(server.uri()), store)
    }

    async fn mount_versions(server: &MockServer) {
        mount(
            server,
            "/projects/acme/versions.json",
            json!({
                "versions": [
                    {"id": 5, "name": "v1.0", "description": "", "status": "closed", "due_date": "2024-03-01"},
                    {"id": 7, "name": "v2.0", "description": "Next", "status": "open"}
                ],
                "total_count": 2
            }),
        )
        .await;
        mount(
            server,
            "/projects/acme/wiki/v20.json",
            json!({"wiki_page": {"title": "v20", "text": "Release notes"}}),
        )
        .await;
        // v10 wiki page is absent and answers 404.
    }

    #[tokio::test]
    async fn test_build_import_option() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/issue_statuses.json",
            json!({"issue_statuses": [{"id": 1, "name": "New"}, {"id": 5, "name": "Closed"}, {"id": 9, "name": "On Hold"}]}),
        )
        .await;
        mount(
            &server,
            "/trackers.json",
            json!({"trackers": [{"id": 1, "name": "Bug"}, {"id": 3, "name": "Support"}]}),
        )
        .await;
        mount(
            &server,
            "/enumerations/issue_priorities.json",
            json!({"issue_priorities": [{"id": 1, "name": "Low"}, {"id": 4, "name": "Urgent"}]}),
        )
        .await;

        let option = importer(&server, Arc::new(MemoryStore::new()))
            .build_import_option()
            .await
            .unwrap();

        assert_eq!(option.status_mappings.target("New"), Some("Open"));
        assert_eq!(option.status_mappings.target("On Hold"), None);
        assert_eq!(option.tracker_mappings.target("Bug"), Some("Type::Bug"));
        assert_eq!(option.tracker_mappings.target("Support"), None);
        assert_eq!(option.priority_mappings.target("Urgent"), Some("Priority::Critical"));
        assert!(option.dry_run);
    }

    #[tokio::test]
    async fn test_import_versions_commit() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        let store = Arc::new(MemoryStore::new());

        let milestones = importer(&server, store.clone())
            .import_versions("Acme Corp:acme", "acme", false)
            .await
            .unwrap();

        assert_eq!(milestones.len(), 2);
        let v1 = &milestones[0];
        assert!(v1.closed);
        assert_eq!(v1.description, None);
        assert_eq!(v1.due_date.map(|d| d.to_string()), Some("2024-03-01".to_string()));
        assert_eq!(milestones[1].description.as_deref(), Some("Next\n\nRelease notes"));
        assert_eq!(store.milestone_count(), 2);
    }

    #[tokio::test]
    async fn test_import_versions_skips_existing_and_dry_run_saves_nothing() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        let store = Arc::new(MemoryStore::new());
        store
            .save_milestone(Milestone::new("acme", "v1.0"))
            .await
            .unwrap();

        let milestones = importer(&server, store.clone())
            .import_versions("acme", "acme", true)
            .await
            .unwrap();

        let names: Vec<_> = milestones.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["v2.0"]);
        assert_eq!(store.milestone_count(), 1);
    }

    #[tokio::test]
    async fn test_import_categories() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/projects/acme/issue_categories.json",
            json!({"issue_categories": [{"id": 3, "name": "Docs"}, {"id": 4, "name": "Core"}], "total_count": 2}),
        )
        .await;
        let store = Arc::new(MemoryStore::new());
        let importer = importer(&server, store.clone());
        let option = ImportOption::default();

        let spec = importer
            .import_categories("acme", &option, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spec.choices, vec!["Docs", "Core"]);
        assert_eq!(spec.name_of_empty_value.as_deref(), Some(UNDEFINED_CATEGORY));
        assert!(store.issue_setting().await.unwrap().field_spec("Category").is_none());

        importer.import_categories("acme", &option, false).await.unwrap();
        assert!(store.issue_setting().await.unwrap().field_spec("Category").is_some());

        // Already present.
        assert!(importer
            .import_categories("acme", &option, false)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_dangling_mapping_fails_before_any_request() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::with_setting(IssueSetting::default()));
        let option = ImportOption::default()
            .map_priority("Low", "Severity::Low")
            .with_dry_run(false);

        let result = importer(&server, store.clone())
            .run("acme", "acme", &option)
            .await;

        assert!(matches!(result, Err(MigrationError::UnknownField(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(store.milestone_count(), 0);
    }
}
