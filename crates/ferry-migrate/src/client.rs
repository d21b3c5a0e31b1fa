//! Redmine REST API client.

use crate::error::{MigrationError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Connection settings for a Redmine server.
#[derive(Debug, Clone)]
pub struct ImportServer {
    api_url: String,
    api_key: Option<String>,
}

impl ImportServer {
    /// Create settings for the server at `api_url` (e.g. "https://redmine.example.com").
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Set the API key sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Base URL of the server.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Absolute endpoint for an API path such as "/issues.json".
    pub fn api_endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Open a client for one top-level operation.
    ///
    /// The connection pool is released when the client is dropped.
    pub fn new_client(&self) -> Result<RedmineClient> {
        let client = Client::builder()
            .user_agent("ferry-migrate")
            .build()
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        Ok(RedmineClient {
            client,
            server: self.clone(),
        })
    }
}

/// Client for reading from the Redmine API.
pub struct RedmineClient {
    client: Client,
    server: ImportServer,
}

impl RedmineClient {
    /// Absolute endpoint for an API path.
    pub fn api_endpoint(&self, path: &str) -> String {
        self.server.api_endpoint(path)
    }

    /// GET an endpoint and deserialize the response body.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let value = self.get_value(endpoint).await?;
        serde_json::from_value(value).map_err(|e| MigrationError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET an endpoint and return the raw JSON body.
    pub async fn get_value(&self, endpoint: &str) -> Result<Value> {
        self.get_url(parse_endpoint(endpoint)?).await
    }

    pub(crate) async fn get_url(&self, url: Url) -> Result<Value> {
        debug!(url = %url, "GET");

        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.server.api_key {
            request = request.header("X-Redmine-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(MigrationError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED => {
                return Err(MigrationError::AuthenticationFailed(
                    "Invalid Redmine API key".to_string(),
                ))
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(MigrationError::ApiError(format!(
                    "Redmine API error ({status}) for {url}: {body}"
                )));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| MigrationError::MalformedResponse {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })
    }
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| MigrationError::InvalidUrl {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_api_endpoint() {
        let server = ImportServer::new("https://redmine.example.com/");
        assert_eq!(
            server.api_endpoint("/issues.json"),
            "https://redmine.example.com/issues.json"
        );
    }

    #[test]
    fn test_client_creation() {
        let client = ImportServer::new("http://localhost:3000").new_client();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_url_is_fatal() {
        let client = ImportServer::new("not a url").new_client().unwrap();
        let result = client.get_value(&client.api_endpoint("/trackers.json")).await;
        assert!(matches!(result, Err(MigrationError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/9.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/trackers.json"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = ImportServer::new(mock_server.uri()).new_client().unwrap();

        let result = client.get_value(&client.api_endpoint("/users/9.json")).await;
        assert!(result.unwrap_err().is_not_found());

        let result = client.get_value(&client.api_endpoint("/trackers.json")).await;
        assert!(matches!(result, Err(MigrationError::ApiError(_))));

        let result = client.get_value(&client.api_endpoint("/projects.json")).await;
        assert!(matches!(result, Err(MigrationError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_api_key_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/trackers.json"))
            .and(header("X-Redmine-API-Key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"trackers": []})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ImportServer::new(mock_server.uri())
            .with_api_key("secret")
            .new_client()
            .unwrap();
        let value = client
            .get_value(&client.api_endpoint("/trackers.json"))
            .await
            .unwrap();
        assert!(value["trackers"].is_array());
    }
}
