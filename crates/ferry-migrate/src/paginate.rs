//! Offset-based pagination over Redmine collection endpoints.
//!
//! Redmine wraps collections in an envelope such as
//! `{"issues": [...], "total_count": 42, "offset": 0, "limit": 25}`.
//! [`Pages`] pulls one page at a time, advancing the `offset` query
//! parameter by the size of the previous page until the reported total is
//! reached. Endpoints without `total_count` are treated as single-page.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::client::{parse_endpoint, RedmineClient};
use crate::error::{MigrationError, Result};

/// A finite, single-pass sequence of pages from one collection endpoint.
pub struct Pages<'a, T> {
    client: &'a RedmineClient,
    endpoint: Url,
    collection: String,
    cancel: CancellationToken,
    offset: usize,
    requests: usize,
    done: bool,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Pages<'a, T> {
    /// Prepare to page through `collection` at `endpoint`.
    ///
    /// Fails immediately if the endpoint is not a valid URL.
    pub fn new(
        client: &'a RedmineClient,
        endpoint: &str,
        collection: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: parse_endpoint(endpoint)?,
            collection: collection.into(),
            cancel: CancellationToken::new(),
            offset: 0,
            requests: 0,
            done: false,
            _item: PhantomData,
        })
    }

    /// Abort with [`MigrationError::Interrupted`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Number of page requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Fetch the next page, or `None` once the collection is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        if self.done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            return Err(MigrationError::Interrupted);
        }

        let fetched = self.fetch().await;
        if fetched.is_err() {
            self.done = true;
        }
        fetched.map(Some)
    }

    /// Drain every remaining page into one vector, preserving order.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        while let Some(page) = self.next_page().await? {
            all_items.extend(page);
        }
        Ok(all_items)
    }

    async fn fetch(&mut self) -> Result<Vec<T>> {
        let mut url = self.endpoint.clone();
        if self.offset > 0 {
            url.query_pairs_mut()
                .append_pair("offset", &self.offset.to_string());
        }

        self.requests += 1;
        let mut envelope = self.client.get_url(url).await?;

        let items = match envelope.get_mut(self.collection.as_str()).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(MigrationError::MalformedResponse {
                    endpoint: self.endpoint.to_string(),
                    reason: format!("missing '{}' array", self.collection),
                })
            }
        };

        let page = items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| MigrationError::MalformedResponse {
                endpoint: self.endpoint.to_string(),
                reason: e.to_string(),
            })?;

        match envelope.get("total_count").and_then(Value::as_u64) {
            None => self.done = true,
            Some(total) => {
                let total = usize::try_from(total).unwrap_or(usize::MAX);
                if page.is_empty() || self.offset + page.len() >= total {
                    self.done = true;
                } else {
                    self.offset += page.len();
                }
            }
        }

        debug!(
            collection = %self.collection,
            offset = self.offset,
            items = page.len(),
            "Fetched page"
        );

        Ok(page)
    }
}

/// Fetch every item of a collection endpoint.
pub async fn list_all<T: DeserializeOwned>(
    client: &RedmineClient,
    endpoint: &str,
    collection: &str,
) -> Result<Vec<T>> {
    Pages::new(client, endpoint, collection)?.collect_all().await
}
