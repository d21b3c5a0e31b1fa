//! Error types for tracker operations.

use thiserror::Error;

/// Errors that can occur while reading or writing tracker entities.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Issue not found.
    #[error("issue not found: id {id}")]
    IssueNotFound { id: u64 },

    /// An issue with this number already exists in the project.
    #[error("issue already exists: {project}#{number}")]
    IssueExists { project: String, number: u64 },

    /// A milestone with this name already exists in the project.
    #[error("milestone already exists: {project}/{name}")]
    MilestoneExists { project: String, name: String },

    /// A field with this name is already declared.
    #[error("field already declared: {name}")]
    FieldExists { name: String },

    /// A user with this email already exists.
    #[error("user already exists: {email}")]
    UserExists { email: String },

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
