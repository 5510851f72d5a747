//! Long-running operations
//!
//! Mutating calls return an [`OperationHandle`] as soon as the API accepts the
//! request. [`OperationPoller`] is a separate, bounded way to wait for one of
//! those handles to finish; the lifecycle calls never use it.

use crate::error::{NotebookError, Result};
use crate::gcp::client::{ClientFactory, NotebookClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Opaque name of a long-running operation, e.g.
/// `projects/p/locations/l/operations/operation-123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    /// Wrap an operation name obtained elsewhere (e.g. printed by an earlier call)
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Take the `name` of an operation returned by a submission
    pub(crate) fn from_response(response: &serde_json::Value) -> Result<Self> {
        response
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|name| !name.is_empty())
            .map(|name| Self(name.to_string()))
            .ok_or_else(|| {
                NotebookError::InvalidResponse("operation response has no name".to_string())
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `google.longrunning.Operation` as far as we read it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Shortest pause between two polls, whatever [`WaitConfig`] says
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(10);

/// Bounds for [`OperationPoller::wait`]
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between polls
    pub initial_delay: Duration,
    /// Cap for the exponential growth of the delay
    pub max_delay: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

/// Polls an operation until it is done, times out or is cancelled
pub struct OperationPoller {
    factory: ClientFactory,
    config: WaitConfig,
}

impl OperationPoller {
    pub fn new(factory: ClientFactory, config: WaitConfig) -> Self {
        Self { factory, config }
    }

    /// Fetch the current state of an operation once
    pub async fn get(&self, project: &str, location: &str, handle: &OperationHandle) -> Result<Operation> {
        let session = self.factory.open(project, location).await?;
        fetch(&session, handle).await
    }

    /// Wait for `handle` to finish
    ///
    /// A finished operation that carries an error status becomes
    /// [`NotebookError::OperationFailed`].
    pub async fn wait(
        &self,
        project: &str,
        location: &str,
        handle: &OperationHandle,
        cancel: &CancellationToken,
    ) -> Result<Operation> {
        let session = self.factory.open(project, location).await?;
        let start = tokio::time::Instant::now();
        let mut delay = self.config.initial_delay.max(MIN_POLL_DELAY);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let operation = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(NotebookError::Cancelled(format!("waiting for {}", handle)));
                }
                op = fetch(&session, handle) => op?,
            };

            if operation.done {
                return match operation.error {
                    Some(status) if status.code != 0 => Err(NotebookError::OperationFailed {
                        name: operation.name,
                        code: status.code,
                        message: status.message,
                    }),
                    _ => {
                        info!(operation = %handle, attempts, "Operation done");
                        Ok(operation)
                    }
                };
            }

            if start.elapsed().saturating_add(delay) > self.config.timeout {
                return Err(NotebookError::Timeout(format!(
                    "{} after {:?} ({} polls)",
                    handle, self.config.timeout, attempts
                )));
            }

            debug!(operation = %handle, attempt = attempts, delay_ms = delay.as_millis() as u64, "Operation pending");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(NotebookError::Cancelled(format!("waiting for {}", handle)));
                }
            }

            delay = next_delay(delay, self.config.max_delay);
        }
    }
}

/// Double `current`, capped at `max_delay` and never below [`MIN_POLL_DELAY`]
fn next_delay(current: Duration, max_delay: Duration) -> Duration {
    current.saturating_mul(2).min(max_delay).max(MIN_POLL_DELAY)
}

async fn fetch(session: &NotebookClient, handle: &OperationHandle) -> Result<Operation> {
    let response = session.get(handle.as_str()).await?;
    serde_json::from_value(response)
        .map_err(|e| NotebookError::InvalidResponse(format!("operation {}: {}", handle, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handle_from_response() {
        let handle = OperationHandle::from_response(&json!({
            "name": "projects/p/locations/l/operations/op-1",
            "done": false
        }))
        .unwrap();
        assert_eq!(handle.as_str(), "projects/p/locations/l/operations/op-1");
        assert_eq!(handle.to_string(), handle.clone().into_inner());
    }

    #[test]
    fn test_handle_requires_name() {
        assert!(matches!(
            OperationHandle::from_response(&json!({"done": false})),
            Err(NotebookError::InvalidResponse(_))
        ));
        assert!(OperationHandle::from_response(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_next_delay_saturates_and_has_floor() {
        assert_eq!(
            next_delay(Duration::MAX, Duration::MAX),
            Duration::MAX
        );
        assert_eq!(
            next_delay(Duration::from_secs(20), Duration::from_secs(30)),
            Duration::from_secs(30)
        );
        assert_eq!(next_delay(Duration::ZERO, Duration::ZERO), MIN_POLL_DELAY);
        assert_eq!(
            next_delay(Duration::from_millis(40), Duration::from_secs(1)),
            Duration::from_millis(80)
        );
    }

    #[test]
    fn test_handle_new() {
        let handle = OperationHandle::new("projects/p/locations/l/operations/op-9");
        assert_eq!(handle.as_str(), "projects/p/locations/l/operations/op-9");
    }

    #[test]
    fn test_operation_defaults() {
        let op: Operation = serde_json::from_value(json!({"name": "op"})).unwrap();
        assert!(!op.done);
        assert!(op.error.is_none());
    }
}
