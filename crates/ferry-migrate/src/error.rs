//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
///
/// Every variant aborts the run. Per-record conditions (unresolved users,
/// unmapped values, unknown history properties) are collected into the
/// [`ImportResult`](crate::ImportResult) instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Failed to authenticate with the source tracker.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found on the source tracker.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source endpoint could not be parsed as a URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Network error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response did not have the expected shape.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A mapping targets a field the issue setting does not declare.
    #[error("No field spec found: {0}")]
    UnknownField(String),

    /// A source timestamp could not be parsed.
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// The run was cancelled.
    #[error("Import interrupted")]
    Interrupted,

    /// Target store rejected an operation.
    #[error("Store error: {0}")]
    Store(#[from] ferry_tracker::TrackerError),
}

impl MigrationError {
    /// Returns true if the source reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrationError::NotFound(_))
    }

    /// Returns true if the run stopped because it was cancelled.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MigrationError::Interrupted)
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
