//! Import configuration file.
//!
//! Loaded from YAML, TOML or JSON and overlaid with `FERRY__*` environment
//! variables, e.g. `FERRY__REDMINE__API_KEY`.

use anyhow::{Context, Result};
use ferry_migrate::{ImportOption, ImportServer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use validator::Validate;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FerryConfig {
    /// Redmine server to import from.
    #[validate(nested)]
    pub redmine: RedmineConfig,

    /// Projects to import.
    #[validate(length(min = 1, message = "at least one project is required"), nested)]
    pub projects: Vec<ProjectConfig>,

    /// Mapping overrides and import flags.
    #[serde(default)]
    pub import: ImportSettings,

    /// Store snapshot used when `--snapshot` is not given.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RedmineConfig {
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A Redmine project and the target project it is imported into.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ProjectConfig {
    /// Redmine identifier, optionally as `Display Name:identifier`.
    #[validate(length(min = 1))]
    pub source: String,
    #[validate(length(min = 1))]
    pub target: String,
}

/// Overrides applied on top of the options read from Redmine.
///
/// A `null` target leaves the source value unmapped.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportSettings {
    pub status: BTreeMap<String, Option<String>>,
    pub tracker: BTreeMap<String, Option<String>>,
    pub priority: BTreeMap<String, Option<String>>,
    pub assignees_field: Option<String>,
    pub category_field: Option<String>,
    pub use_existing_numbers: bool,
}

impl FerryConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: FerryConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("FERRY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// The Redmine server described by this configuration.
    pub fn server(&self) -> ImportServer {
        let server = ImportServer::new(self.redmine.url.as_str());
        match &self.redmine.api_key {
            Some(key) if !key.is_empty() => server.with_api_key(key.as_str()),
            _ => server,
        }
    }

    /// Apply the file's overrides to options built from Redmine.
    pub fn apply(&self, mut option: ImportOption) -> ImportOption {
        let settings = &self.import;
        for (source, target) in &settings.status {
            option.status_mappings.set(source.as_str(), target.clone());
        }
        for (source, target) in &settings.tracker {
            option.tracker_mappings.set(source.as_str(), target.clone());
        }
        for (source, target) in &settings.priority {
            option.priority_mappings.set(source.as_str(), target.clone());
        }
        if let Some(field) = &settings.assignees_field {
            option.assignees_field = field.clone();
        }
        if let Some(field) = &settings.category_field {
            option.category_field = field.clone();
        }
        option.use_existing_numbers = settings.use_existing_numbers;
        option
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_config(
            r#"
redmine:
  url: https://redmine.example.com/
  api_key: secret
projects:
  - source: "Acme Corp:acme"
    target: acme
import:
  tracker:
    Support: "Type::Task"
    Bug: ~
  category_field: Component
  use_existing_numbers: true
"#,
        );

        let config = FerryConfig::load(file.path()).unwrap();
        assert_eq!(config.projects[0].target, "acme");
        assert_eq!(config.server().api_url(), "https://redmine.example.com");

        let option = config.apply(ImportOption::default().map_tracker("Bug", "Type::Bug"));
        assert_eq!(option.tracker_mappings.target("Support"), Some("Type::Task"));
        assert_eq!(option.tracker_mappings.target("Bug"), None);
        assert_eq!(option.category_field, "Component");
        assert!(option.use_existing_numbers);
        assert!(option.dry_run);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let file = write_config(
            r#"
redmine:
  url: not a url
projects:
  - source: acme
    target: acme
"#,
        );
        assert!(FerryConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_projects_are_required() {
        let file = write_config(
            r#"
redmine:
  url: https://redmine.example.com
projects: []
"#,
        );
        assert!(FerryConfig::load(file.path()).is_err());
    }
}
