//! Operator options and the result of an import run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::mapping::{MappingTable, PriorityDomain, StatusDomain, TrackerDomain};

/// Default name of the target field holding assignees.
pub const DEFAULT_ASSIGNEES_FIELD: &str = "Assignees";

/// Default name of the target field holding the Redmine category.
pub const DEFAULT_CATEGORY_FIELD: &str = "Category";

/// Options controlling an import run.
///
/// Built from the live source with
/// [`RedmineImporter::build_import_option`](crate::RedmineImporter::build_import_option),
/// adjusted by the operator, then passed by reference to
/// [`RedmineImporter::run`](crate::RedmineImporter::run).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOption {
    /// Redmine status → target state.
    pub status_mappings: MappingTable<StatusDomain>,

    /// Redmine tracker → `Field::Value`.
    pub tracker_mappings: MappingTable<TrackerDomain>,

    /// Redmine priority → `Field::Value`.
    pub priority_mappings: MappingTable<PriorityDomain>,

    /// Target field receiving the assignee.
    pub assignees_field: String,

    /// Target field receiving the category.
    pub category_field: String,

    /// Keep Redmine issue ids as issue numbers.
    pub use_existing_numbers: bool,

    /// Compute everything but persist nothing.
    pub dry_run: bool,
}

impl Default for ImportOption {
    fn default() -> Self {
        Self {
            status_mappings: MappingTable::new(),
            tracker_mappings: MappingTable::new(),
            priority_mappings: MappingTable::new(),
            assignees_field: DEFAULT_ASSIGNEES_FIELD.to_string(),
            category_field: DEFAULT_CATEGORY_FIELD.to_string(),
            use_existing_numbers: false,
            dry_run: true,
        }
    }
}

impl ImportOption {
    /// Map a Redmine status to a target state.
    pub fn map_status(mut self, source: impl Into<String>, state: impl Into<String>) -> Self {
        self.status_mappings.set(source, Some(state.into()));
        self
    }

    /// Map a Redmine tracker to a `Field::Value` target.
    pub fn map_tracker(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.tracker_mappings.set(source, Some(target.into()));
        self
    }

    /// Map a Redmine priority to a `Field::Value` target.
    pub fn map_priority(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.priority_mappings.set(source, Some(target.into()));
        self
    }

    /// Set the assignees field name.
    pub fn with_assignees_field(mut self, name: impl Into<String>) -> Self {
        self.assignees_field = name.into();
        self
    }

    /// Set the category field name.
    pub fn with_category_field(mut self, name: impl Into<String>) -> Self {
        self.category_field = name.into();
        self
    }

    /// Keep or reassign Redmine issue numbers.
    pub fn with_existing_numbers(mut self, keep: bool) -> Self {
        self.use_existing_numbers = keep;
        self
    }

    /// Enable or disable dry run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Outcome of an import run.
///
/// Sets are sorted and deduplicated so two runs over the same source
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Redmine accounts without a target user, as `display name:login`.
    pub unresolved_logins: BTreeSet<String>,

    /// Version names without a target milestone.
    pub unresolved_milestones: BTreeSet<String>,

    /// Tracker values with no mapping, HTML-escaped.
    pub unmapped_trackers: BTreeSet<String>,

    /// Priority values with no mapping, as Redmine names them.
    pub unmapped_priorities: BTreeSet<String>,

    /// Free-form notes in the order they were raised.
    pub notes: Vec<String>,

    /// Number of Redmine issues transformed.
    pub issues_processed: usize,

    /// Whether issues were persisted.
    pub issues_imported: bool,
}

impl ImportResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a note unless an identical one was already recorded.
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    /// True when nothing needs the operator's attention.
    pub fn is_clean(&self) -> bool {
        self.unresolved_logins.is_empty()
            && self.unresolved_milestones.is_empty()
            && self.unmapped_trackers.is_empty()
            && self.unmapped_priorities.is_empty()
            && self.notes.is_empty()
    }

    /// Print a summary of the run.
    pub fn print_summary(&self) {
        println!("\n=== Import Summary ===\n");
        println!("Issues processed:   {}", self.issues_processed);
        println!(
            "Issues imported:    {}",
            if self.issues_imported { "✓" } else { "✗" }
        );

        print_set("Unresolved logins", &self.unresolved_logins);
        print_set("Unresolved milestones", &self.unresolved_milestones);
        print_set("Unmapped trackers", &self.unmapped_trackers);
        print_set("Unmapped priorities", &self.unmapped_priorities);

        if !self.notes.is_empty() {
            println!("\nNotes ({}):", self.notes.len());
            for note in &self.notes {
                println!("  - {note}");
            }
        }

        let status = if self.is_clean() { "CLEAN" } else { "NEEDS REVIEW" };
        println!("\nOverall Status: {status}");
    }
}

fn print_set(title: &str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }
    println!("\n{title} ({}):", values.len());
    for value in values {
        println!("  - {value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_builder() {
        let option = ImportOption::default()
            .map_status("On Hold", "Open")
            .map_tracker("Support", "Type::Task")
            .with_category_field("Component")
            .with_dry_run(false);

        assert_eq!(option.status_mappings.target("On Hold"), Some("Open"));
        assert_eq!(option.tracker_mappings.target("Support"), Some("Type::Task"));
        assert_eq!(option.category_field, "Component");
        assert_eq!(option.assignees_field, DEFAULT_ASSIGNEES_FIELD);
        assert!(!option.dry_run);
        assert!(!option.use_existing_numbers);
    }

    #[test]
    fn test_option_defaults_to_dry_run() {
        assert!(ImportOption::default().dry_run);

        let parsed: ImportOption = serde_json::from_str("{}").unwrap();
        assert!(parsed.dry_run);
        assert_eq!(parsed.category_field, DEFAULT_CATEGORY_FIELD);
    }

    #[test]
    fn test_notes_are_deduplicated_in_order() {
        let mut result = ImportResult::new();
        result.add_note("b");
        result.add_note("a");
        result.add_note("b");

        assert_eq!(result.notes, vec!["b", "a"]);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_sets_are_sorted() {
        let mut result = ImportResult::new();
        result.unmapped_trackers.insert("Support".to_string());
        result.unmapped_trackers.insert("Epic".to_string());
        result.unmapped_trackers.insert("Support".to_string());

        let values: Vec<_> = result.unmapped_trackers.iter().collect();
        assert_eq!(values, vec!["Epic", "Support"]);
    }
}
