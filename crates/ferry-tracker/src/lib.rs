//! Target tracker model for Ferry.
//!
//! This crate holds the entities the import engine assembles (issues,
//! milestones, comments, change records), the global issue setting that
//! declares states and custom fields, and the [`TrackerStore`] interface
//! through which everything is persisted.

mod change;
mod comment;
mod error;
mod field;
mod issue;
mod milestone;
mod store;
mod user;

pub use change::{ChangeData, IssueChange};
pub use comment::IssueComment;
pub use error::TrackerError;
pub use field::{FieldKind, FieldSpec, IssueSetting, StateSpec};
pub use issue::{Issue, IssueField, IssueSchedule, LastUpdate};
pub use milestone::Milestone;
pub use store::{MemoryStore, StoreSnapshot, TrackerStore};
pub use user::User;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
