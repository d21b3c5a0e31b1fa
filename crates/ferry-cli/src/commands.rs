//! CLI command implementations.

use anyhow::{Context, Result};
use ferry_migrate::{ConsoleProgressReporter, ImportResult, MigrationProgress, RedmineImporter};
use ferry_tracker::{MemoryStore, StoreSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::FerryConfig;

/// Loads the store snapshot at `path`, or an empty store if there is none.
pub fn open_store(path: Option<&Path>) -> Result<MemoryStore> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(MemoryStore::new());
    };

    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&data)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    MemoryStore::from_snapshot(snapshot)
        .with_context(|| format!("inconsistent snapshot {}", path.display()))
}

/// Writes the store contents to `path`.
pub fn save_store(store: &MemoryStore, path: &Path) -> Result<()> {
    let data = serde_json::to_string_pretty(&store.snapshot())?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    tracing::info!(path = %path.display(), "Saved store snapshot");
    Ok(())
}

fn snapshot_path(config: &FerryConfig, snapshot: Option<PathBuf>) -> Option<PathBuf> {
    snapshot.or_else(|| config.snapshot.clone())
}

/// Print the import options derived from Redmine, with the file's
/// overrides applied, as YAML.
pub async fn options(config_path: &Path, snapshot: Option<PathBuf>) -> Result<()> {
    let config = FerryConfig::load(config_path)?;
    let store = open_store(snapshot_path(&config, snapshot).as_deref())?;
    let importer = RedmineImporter::new(config.server(), Arc::new(store));

    let option = importer
        .build_import_option()
        .await
        .context("failed to read Redmine settings")?;
    let option = config.apply(option);

    print!("{}", serde_yaml::to_string(&option)?);
    Ok(())
}

/// Import every configured project.
pub async fn import(
    config_path: &Path,
    commit: bool,
    snapshot: Option<PathBuf>,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let config = FerryConfig::load(config_path)?;
    let snapshot = snapshot_path(&config, snapshot);
    let store = Arc::new(open_store(snapshot.as_deref())?);

    let reporter = ConsoleProgressReporter::new();
    let importer = RedmineImporter::new(config.server(), store.clone())
        .with_progress(MigrationProgress::with_callback(reporter.callback()))
        .with_cancellation(cancel);

    let option = importer
        .build_import_option()
        .await
        .context("failed to read Redmine settings")?;
    let option = config.apply(option).with_dry_run(!commit);

    let mut results: Vec<(String, ImportResult)> = Vec::new();
    for project in &config.projects {
        tracing::info!(source = %project.source, target = %project.target, "Importing project");
        match importer.run(&project.source, &project.target, &option).await {
            Ok(result) => results.push((project.source.clone(), result)),
            Err(e) => {
                reporter.abandon();
                return Err(e).with_context(|| format!("import of {} failed", project.source));
            }
        }
    }
    reporter.finish(if commit { "Import complete" } else { "Dry run complete" });

    if commit {
        if let Some(path) = &snapshot {
            save_store(&store, path)?;
        }
    }

    if json {
        let report: std::collections::BTreeMap<_, _> = results.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (project, result) in &results {
            println!("\nProject: {project}");
            result.print_summary();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_tracker::{Issue, TrackerStore};

    #[test]
    fn test_missing_snapshot_opens_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(store.issue_count(), 0);
        assert_eq!(open_store(None).unwrap().issue_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        let mut issue = Issue::new("acme", "Crash");
        issue.number = store.next_issue_number("acme").await.unwrap();
        store.save_issue(&issue).await.unwrap();
        save_store(&store, &path).unwrap();

        let reopened = open_store(Some(&path)).unwrap();
        assert_eq!(reopened.issue_count(), 1);
        assert_eq!(reopened.next_issue_number("acme").await.unwrap(), 2);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(open_store(Some(&path)).is_err());
    }
}
