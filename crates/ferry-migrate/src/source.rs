//! Redmine API response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{MigrationError, Result};

/// Reference to another Redmine entity, e.g. `{"id": 3, "name": "Bug"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedmineIssue {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: NamedRef,
    #[serde(default)]
    pub tracker: Option<NamedRef>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    pub author: NamedRef,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub fixed_version: Option<NamedRef>,
    pub created_on: String,
}

/// One entry of an issue's history.
#[derive(Debug, Clone, Deserialize)]
pub struct RedmineJournal {
    #[serde(default)]
    pub id: u64,
    pub user: NamedRef,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_on: String,
    #[serde(default)]
    pub details: Vec<JournalDetail>,
}

/// A single attribute-level change inside a journal entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalDetail {
    pub property: String,
    #[serde(deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub old_value: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedmineVersion {
    #[serde(deserialize_with = "text")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl RedmineVersion {
    pub fn is_closed(&self) -> bool {
        self.status == "closed"
    }

    /// Identifier of the wiki page that documents this version.
    pub fn wiki_page_id(&self) -> String {
        self.name.replace(' ', "_").replace('.', "")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: RedmineUser,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RedmineUser {
    #[serde(default)]
    pub mail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JournalsEnvelope {
    pub issue: IssueJournals,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IssueJournals {
    #[serde(default)]
    pub journals: Vec<RedmineJournal>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WikiEnvelope {
    pub wiki_page: WikiPage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WikiPage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Parses a Redmine timestamp such as `2024-01-02T10:00:00Z`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MigrationError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parses a Redmine date such as `2024-03-01`.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| MigrationError::InvalidTimestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Project identifiers may be given as `Display Name:identifier`.
pub fn project_id(project: &str) -> &str {
    project.rsplit_once(':').map_or(project, |(_, id)| id)
}

// Redmine is loose about numbers versus strings in ids and detail values.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}
