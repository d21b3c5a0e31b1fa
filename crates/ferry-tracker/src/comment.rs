//! Issue comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::User;

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    /// Unique identifier (0 until persisted).
    pub id: u64,
    /// Author of the comment.
    pub user: User,
    /// When the comment was made.
    pub date: DateTime<Utc>,
    /// Comment body (Markdown).
    pub content: String,
}

impl IssueComment {
    /// Creates a new comment.
    pub fn new(user: User, date: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            user,
            date,
            content: content.into(),
        }
    }
}
