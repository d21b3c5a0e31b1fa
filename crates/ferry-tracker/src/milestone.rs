//! Milestones that issues can be scheduled against.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A project milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier within the store (0 until saved).
    pub id: u64,
    /// Owning project.
    pub project: String,
    /// Milestone name, unique within the project.
    pub name: String,
    /// Description (Markdown).
    pub description: Option<String>,
    /// Due date, if any.
    pub due_date: Option<NaiveDate>,
    /// Whether the milestone is closed.
    pub closed: bool,
}

impl Milestone {
    /// Creates a new open milestone.
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            project: project.into(),
            name: name.into(),
            description: None,
            due_date: None,
            closed: false,
        }
    }

    /// Appends a paragraph to the description, creating it if absent.
    pub fn append_description(&mut self, text: &str) {
        self.description = Some(match self.description.take() {
            Some(existing) => format!("{existing}\n\n{text}"),
            None => text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_description() {
        let mut milestone = Milestone::new("acme", "v1.0");
        milestone.append_description("Release notes");
        assert_eq!(milestone.description.as_deref(), Some("Release notes"));

        milestone.append_description("More notes");
        assert_eq!(
            milestone.description.as_deref(),
            Some("Release notes\n\nMore notes")
        );
    }
}
