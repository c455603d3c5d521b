//! HTTP implementation of [`MutationApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use super::action::{BatchItem, Record, ResourceType};
use super::executor::MutationApi;
use crate::config::RemoteConfig;
use crate::error::SyncError;

/// REST client for the planner's mutation endpoints.
pub struct HttpMutationApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpMutationApi {
    /// Build a client from the remote configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn collection_url(&self, resource: ResourceType) -> String {
        format!("{}/{}s", self.base_url, resource.as_str())
    }

    fn record_url(&self, resource: ResourceType, id: &str) -> String {
        format!("{}/{id}", self.collection_url(resource))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, SyncError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("Network error: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read response: {e}")))?;
        debug!(status = status.as_u16(), bytes = body.len(), "Remote response");

        if !status.is_success() {
            return Err(SyncError::Application {
                status: Some(status.as_u16()),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| SyncError::Application {
            status: Some(status.as_u16()),
            message: format!("Failed to parse response: {e}"),
        })
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl MutationApi for HttpMutationApi {
    async fn create(&self, resource: ResourceType, record: &Record) -> Result<Value, SyncError> {
        let url = self.collection_url(resource);
        self.send(self.request(Method::POST, &url).json(record)).await
    }

    async fn update(
        &self,
        resource: ResourceType,
        id: &str,
        changes: &Record,
    ) -> Result<Value, SyncError> {
        let url = self.record_url(resource, id);
        self.send(self.request(Method::PATCH, &url).json(changes)).await
    }

    async fn delete(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError> {
        let url = self.record_url(resource, id);
        self.send(self.request(Method::DELETE, &url)).await
    }

    async fn restore(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError> {
        let url = format!("{}/restore", self.record_url(resource, id));
        self.send(self.request(Method::POST, &url)).await
    }

    async fn complete(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError> {
        let url = format!("{}/complete", self.record_url(resource, id));
        self.send(self.request(Method::POST, &url)).await
    }

    async fn batch_delete(&self, items: &[BatchItem]) -> Result<Value, SyncError> {
        let url = format!("{}/batch/delete", self.base_url);
        let body = json!({ "items": items });
        self.send(self.request(Method::POST, &url).json(&body)).await
    }

    async fn batch_restore(&self, items: &[BatchItem]) -> Result<Value, SyncError> {
        let url = format!("{}/batch/restore", self.base_url);
        let body = json!({ "items": items });
        self.send(self.request(Method::POST, &url).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> HttpMutationApi {
        let config = RemoteConfig {
            base_url: base_url.to_string(),
            ..RemoteConfig::default()
        };
        HttpMutationApi::new(&config).unwrap()
    }

    #[test]
    fn test_urls() {
        let api = api("http://localhost:3000/api/");
        assert_eq!(
            api.collection_url(ResourceType::StudySession),
            "http://localhost:3000/api/study_sessions"
        );
        assert_eq!(
            api.record_url(ResourceType::Course, "C1"),
            "http://localhost:3000/api/courses/C1"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message": "Title required"}"#).as_deref(),
            Some("Title required")
        );
        assert_eq!(error_message(r#"{"error": "nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message("<html>"), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments
        let api = api("http://127.0.0.1:9/api");
        let err = api
            .delete(ResourceType::Assignment, "A1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
