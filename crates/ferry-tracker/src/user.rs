//! Target user accounts.

use serde::{Deserialize, Serialize};

/// A user of the target tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier within the store.
    pub id: u64,
    /// Login name.
    pub name: String,
    /// Full name, if known.
    pub full_name: Option<String>,
    /// Primary email address.
    pub email: Option<String>,
}

impl User {
    /// Identifier reserved for the unknown user.
    pub const UNKNOWN_ID: u64 = 0;

    /// Creates a new user.
    pub fn new(id: u64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            full_name: None,
            email: Some(email.into()),
        }
    }

    /// The well-known user that stands in for accounts that could not be resolved.
    pub fn unknown() -> Self {
        Self {
            id: Self::UNKNOWN_ID,
            name: "Unknown".to_string(),
            full_name: None,
            email: None,
        }
    }

    /// Sets the full name.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Returns true if this is the unknown user.
    pub fn is_unknown(&self) -> bool {
        self.id == Self::UNKNOWN_ID
    }

    /// Name suitable for display: the full name if set, otherwise the login.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user() {
        let user = User::unknown();
        assert!(user.is_unknown());
        assert!(user.email.is_none());
        assert!(!User::new(7, "alice", "alice@example.com").is_unknown());
    }

    #[test]
    fn test_display_name() {
        let user = User::new(1, "alice", "alice@example.com");
        assert_eq!(user.display_name(), "alice");

        let user = user.with_full_name("Alice Liddell");
        assert_eq!(user.display_name(), "Alice Liddell");
    }
}
