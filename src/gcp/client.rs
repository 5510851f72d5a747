//! GCP Client
//!
//! [`ClientFactory`] turns a [`ClientConfig`] into short-lived
//! [`NotebookClient`] sessions, each bound to one project, one location and
//! one credential. A session lives for a single orchestration call and is
//! released when it goes out of scope.

use super::auth::{Credential, CredentialSource};
use super::http::GcpHttpClient;
use crate::error::{NotebookError, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Public Notebooks API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://notebooks.googleapis.com";

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to open a session, resolved once by the caller
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub credentials: CredentialSource,
}

impl ClientConfig {
    pub fn new(credentials: CredentialSource) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            credentials,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Builds sessions against the Notebooks API
#[derive(Debug, Clone)]
pub struct ClientFactory {
    config: ClientConfig,
}

impl ClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Load the configured credential
    pub async fn credential(&self) -> Result<Credential> {
        Credential::resolve(&self.config.credentials).await
    }

    /// Create a session bound to `project_id`/`location` using `credential`
    pub fn connect(
        &self,
        project_id: &str,
        location: &str,
        credential: Credential,
    ) -> Result<NotebookClient> {
        let endpoint = Url::parse(&self.config.endpoint).map_err(|e| {
            NotebookError::Connection(format!("invalid endpoint '{}': {}", self.config.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(NotebookError::Connection(format!(
                "unsupported endpoint scheme '{}'",
                endpoint.scheme()
            )));
        }

        let http = GcpHttpClient::new(self.config.request_timeout)?;

        tracing::trace!("Opened notebooks session for {}/{}", project_id, location);

        Ok(NotebookClient {
            credential,
            http,
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            location: location.to_string(),
        })
    }

    /// Load the credential and connect in one step
    pub async fn open(&self, project_id: &str, location: &str) -> Result<NotebookClient> {
        let credential = self.credential().await?;
        self.connect(project_id, location, credential)
    }
}

/// A session against the Notebooks API
pub struct NotebookClient {
    credential: Credential,
    http: GcpHttpClient,
    base_url: String,
    project_id: String,
    location: String,
}

impl NotebookClient {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Build a Notebooks v2 API URL for a resource path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Make a GET request to the API
    pub async fn get(&self, path: &str) -> Result<Value> {
        let token = self.credential.access_token().await?;
        self.http.get(&self.api_url(path), &token).await
    }

    /// Make a POST request to the API
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.credential.access_token().await?;
        self.http.post(&self.api_url(path), &token, body).await
    }

    /// Make a DELETE request to the API
    pub async fn delete(&self, path: &str) -> Result<Value> {
        let token = self.credential.access_token().await?;
        self.http.delete(&self.api_url(path), &token).await
    }
}

impl Drop for NotebookClient {
    fn drop(&mut self) {
        tracing::trace!("Closed notebooks session for {}/{}", self.project_id, self.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(endpoint: &str) -> ClientFactory {
        ClientFactory::new(
            ClientConfig::new(CredentialSource::AccessToken("t".into())).with_endpoint(endpoint),
        )
    }

    #[test]
    fn test_api_url_joins_without_double_slash() {
        let client = factory("https://notebooks.example.com/")
            .connect("proj1", "us-central1-a", Credential::from_access_token("t"))
            .unwrap();
        assert_eq!(
            client.api_url("projects/proj1/locations/us-central1-a/instances"),
            "https://notebooks.example.com/v2/projects/proj1/locations/us-central1-a/instances"
        );
        assert_eq!(client.project_id(), "proj1");
        assert_eq!(client.location(), "us-central1-a");
    }

    #[test]
    fn test_invalid_endpoint_is_connection_error() {
        let err = factory("not a url")
            .connect("proj1", "us-central1-a", Credential::from_access_token("t"))
            .err()
            .unwrap();
        assert!(matches!(err, NotebookError::Connection(_)));

        let err = factory("ftp://notebooks.example.com")
            .connect("proj1", "us-central1-a", Credential::from_access_token("t"))
            .err()
            .unwrap();
        assert!(matches!(err, NotebookError::Connection(msg) if msg.contains("ftp")));
    }
}
