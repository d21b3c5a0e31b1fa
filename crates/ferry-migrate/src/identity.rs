//! Resolution of Redmine accounts to target users.

use ferry_tracker::{TrackerStore, User};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::client::RedmineClient;
use crate::error::Result;
use crate::source::UserEnvelope;

/// Per-run memo of Redmine login → target user.
///
/// Unresolvable logins are cached as `None` and never queried again.
#[derive(Debug, Default)]
pub struct IdentityCache {
    users: HashMap<String, Option<User>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logins looked up so far.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Resolve a login through the account's email address.
    ///
    /// Redmine answers 404 for unknown or hidden accounts; that resolves to
    /// `None` like an account without an email or without a matching target
    /// user. Any other failure is returned.
    pub async fn resolve(
        &mut self,
        client: &RedmineClient,
        store: &dyn TrackerStore,
        login: &str,
    ) -> Result<Option<User>> {
        if let Some(cached) = self.users.get(login) {
            return Ok(cached.clone());
        }

        let endpoint = client.api_endpoint(&format!("/users/{login}.json"));
        let email = match client.get::<UserEnvelope>(&endpoint).await {
            Ok(envelope) => envelope.user.mail,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let user = match email {
            Some(email) => store.find_user_by_email(&email).await?,
            None => None,
        };

        debug!(login, resolved = user.is_some(), "Resolved Redmine user");
        self.users.insert(login.to_string(), user.clone());
        Ok(user)
    }

    /// Resolve a login, falling back to the store's unknown user.
    ///
    /// Unresolved logins are recorded as `display_name:login`.
    pub async fn resolve_or_unknown(
        &mut self,
        client: &RedmineClient,
        store: &dyn TrackerStore,
        login: &str,
        display_name: &str,
        unresolved: &mut BTreeSet<String>,
    ) -> Result<User> {
        match self.resolve(client, store, login).await? {
            Some(user) => Ok(user),
            None => {
                unresolved.insert(format!("{display_name}:{login}"));
                Ok(store.unknown_user())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ImportServer;
    use ferry_tracker::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, MemoryStore) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/5.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 5, "login": "alice", "mail": "alice@example.com"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/6.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 6, "login": "hidden"}
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/7.json"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/8.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = MemoryStore::new();
        store
            .save_user(User::new(0, "alice", "alice@example.com"))
            .await
            .unwrap();
        (mock_server, store)
    }

    #[tokio::test]
    async fn test_resolve_by_email_is_cached() {
        let (mock_server, store) = setup().await;
        let client = ImportServer::new(mock_server.uri()).new_client().unwrap();
        let mut cache = IdentityCache::new();

        for _ in 0..3 {
            let user = cache.resolve(&client, &store, "5").await.unwrap();
            assert_eq!(user.map(|u| u.name), Some("alice".to_string()));
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_email_and_not_found_are_unresolved() {
        let (mock_server, store) = setup().await;
        let client = ImportServer::new(mock_server.uri()).new_client().unwrap();
        let mut cache = IdentityCache::new();

        assert!(cache.resolve(&client, &store, "6").await.unwrap().is_none());
        assert!(cache.resolve(&client, &store, "7").await.unwrap().is_none());
        // Cached absence does not hit the API again (expect(1) above).
        assert!(cache.resolve(&client, &store, "7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_fatal() {
        let (mock_server, store) = setup().await;
        let client = ImportServer::new(mock_server.uri()).new_client().unwrap();
        let mut cache = IdentityCache::new();

        assert!(cache.resolve(&client, &store, "8").await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_or_unknown_records_login() {
        let (mock_server, store) = setup().await;
        let client = ImportServer::new(mock_server.uri()).new_client().unwrap();
        let mut cache = IdentityCache::new();
        let mut unresolved = BTreeSet::new();

        let user = cache
            .resolve_or_unknown(&client, &store, "7", "Ghost User", &mut unresolved)
            .await
            .unwrap();
        assert!(user.is_unknown());
        assert!(unresolved.contains("Ghost User:7"));

        let user = cache
            .resolve_or_unknown(&client, &store, "5", "Alice", &mut unresolved)
            .await
            .unwrap();
        assert!(!user.is_unknown());
        assert_eq!(unresolved.len(), 1);
    }
}
