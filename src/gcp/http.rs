//! HTTP utilities for GCP REST API calls

use crate::error::{NotebookError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Google API error envelope: `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Build a [`NotebookError::Remote`] from a failed response
pub(crate) fn remote_error(status: StatusCode, body: &str) -> NotebookError {
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => NotebookError::Remote {
            status: status.as_u16(),
            code: if envelope.error.status.is_empty() {
                reason.to_uppercase().replace(' ', "_")
            } else {
                envelope.error.status
            },
            message: if envelope.error.message.is_empty() {
                reason
            } else {
                envelope.error.message
            },
        },
        Err(_) => NotebookError::Remote {
            status: status.as_u16(),
            code: reason.to_uppercase().replace(' ', "_"),
            message: if body.trim().is_empty() {
                reason
            } else {
                sanitize_for_log(body)
            },
        },
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> NotebookError {
    if error.is_timeout() {
        NotebookError::Connection(format!("request to {} timed out", url))
    } else {
        NotebookError::Connection(format!("failed to reach {}: {}", url, error))
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client whose requests fail after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("nbctl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| NotebookError::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.execute(url, self.client.get(url).bearer_auth(token)).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.execute(url, request).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.execute(url, self.client.delete(url).bearer_auth(token)).await
    }

    async fn execute(&self, url: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| transport_error(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, e))?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(remote_error(status, &body));
        }

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| NotebookError::InvalidResponse(format!("{} returned non-JSON body: {}", url, e)))
    }
}
