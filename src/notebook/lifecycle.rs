//! Instance lifecycle
//!
//! [`NotebookService`] maps the lifecycle verbs onto Notebooks v2 requests.
//! Every call opens its own session, submits one request (or drains one
//! listing) and returns. Mutations hand back the operation handle without
//! waiting; whether a transition is allowed is decided by the API alone.

use super::instance::{Instance, InstancePage};
use super::names::{instance_name, parent_path};
use super::operation::OperationHandle;
use super::template::TemplateConfig;
use crate::error::{NotebookError, Result};
use crate::gcp::client::ClientFactory;
use serde_json::{json, Value};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle operations on notebook instances
pub struct NotebookService {
    factory: ClientFactory,
    template: TemplateConfig,
    cancel: CancellationToken,
}

impl NotebookService {
    pub fn new(factory: ClientFactory, template: TemplateConfig) -> Self {
        Self {
            factory,
            template,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight calls when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Names of every instance under `projects/{project}/locations/{location}`
    pub async fn list_instances(&self, project: &str, location: &str) -> Result<Vec<String>> {
        let parent = parent_path(project, location);
        self.guarded(&format!("list {}", parent), async {
            let session = self.factory.open(project, location).await?;
            info!("Listing instances in: {}", parent);

            let mut names = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let path = match &page_token {
                    Some(token) => format!(
                        "{}/instances?pageToken={}",
                        parent,
                        urlencoding::encode(token)
                    ),
                    None => format!("{}/instances", parent),
                };

                let page: InstancePage = parse(session.get(&path).await?, "instance list")?;
                debug!("Fetched page with {} instances", page.instances.len());
                names.extend(page.instances.into_iter().map(|i| i.name));

                match page.next_page_token {
                    Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                        warn!("Server repeated page token for {}, stopping", parent);
                        break;
                    }
                    Some(token) if !token.is_empty() => page_token = Some(token),
                    _ => break,
                }
            }

            info!("Total instances found: {}", names.len());
            Ok(names)
        })
        .await
    }

    /// Submit creation of `instance_id` using the configured template
    pub async fn create_instance(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<OperationHandle> {
        let parent = parent_path(project, location);
        let template = self.template.build();

        self.guarded(&format!("create {}", instance_id), async {
            let session = self.factory.open(project, location).await?;
            let body = template.to_json();
            let path = format!(
                "{}/instances?instanceId={}",
                parent,
                urlencoding::encode(instance_id)
            );

            info!(
                machine = template.machine_shape(),
                image = %template.image_reference(),
                "Creating instance: {} in {}",
                instance_id,
                parent
            );
            let handle = OperationHandle::from_response(&session.post(&path, Some(&body)).await?)?;
            info!("Create submitted: {}", handle);
            Ok(handle)
        })
        .await
    }

    /// Current record of an instance
    pub async fn describe_instance(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<Instance> {
        let name = instance_name(project, location, instance_id).to_string();
        self.guarded(&format!("get {}", name), async {
            let session = self.factory.open(project, location).await?;
            info!("Fetching details for instance: {}", name);
            parse(session.get(&name).await?, "instance")
        })
        .await
    }

    /// `https://` URL of the instance's JupyterLab proxy
    pub async fn get_access_url(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<String> {
        let instance = self.describe_instance(project, location, instance_id).await?;
        instance
            .access_url()
            .ok_or(NotebookError::NotAccessible(instance.name))
    }

    pub async fn start_instance(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<OperationHandle> {
        self.transition(project, location, instance_id, Transition::Start).await
    }

    pub async fn stop_instance(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<OperationHandle> {
        self.transition(project, location, instance_id, Transition::Stop).await
    }

    pub async fn delete_instance(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
    ) -> Result<OperationHandle> {
        self.transition(project, location, instance_id, Transition::Delete).await
    }

    async fn transition(
        &self,
        project: &str,
        location: &str,
        instance_id: &str,
        transition: Transition,
    ) -> Result<OperationHandle> {
        let name = instance_name(project, location, instance_id).to_string();

        self.guarded(&format!("{} {}", transition.verb(), name), async {
            let session = self.factory.open(project, location).await?;
            info!("{} instance: {}", transition.participle(), name);

            let response = match transition {
                Transition::Start => session.post(&format!("{}:start", name), Some(&json!({}))).await?,
                Transition::Stop => session.post(&format!("{}:stop", name), Some(&json!({}))).await?,
                Transition::Delete => session.delete(&name).await?,
            };

            let handle = OperationHandle::from_response(&response)?;
            info!("{} submitted: {}", transition.verb(), handle);
            Ok(handle)
        })
        .await
    }

    /// Run `call` unless the cancellation token fires first
    async fn guarded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(NotebookError::Cancelled(what.to_string()));
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NotebookError::Cancelled(what.to_string())),
            result = call => result,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Start,
    Stop,
    Delete,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
            Transition::Delete => "delete",
        }
    }

    fn participle(self) -> &'static str {
        match self {
            Transition::Start => "Starting",
            Transition::Stop => "Stopping",
            Transition::Delete => "Deleting",
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| NotebookError::InvalidResponse(format!("malformed {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::CredentialSource;
    use crate::gcp::client::ClientConfig;

    fn service() -> NotebookService {
        // Port 9 (discard) is never contacted: every test here stops before the network.
        let config = ClientConfig::new(CredentialSource::AccessToken("t".into()))
            .with_endpoint("http://127.0.0.1:9");
        NotebookService::new(ClientFactory::new(config), TemplateConfig::default())
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let service = service().with_cancellation(token);

        let err = service
            .start_instance("proj1", "us-central1-a", "nb-1")
            .await
            .unwrap_err();
        assert!(matches!(err, NotebookError::Cancelled(msg) if msg.contains("start")));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails_before_request() {
        let config = ClientConfig::new(CredentialSource::KeyFile("/nope/key.json".into()))
            .with_endpoint("http://127.0.0.1:9");
        let service = NotebookService::new(ClientFactory::new(config), TemplateConfig::default());

        let err = service
            .list_instances("proj1", "us-central1-a")
            .await
            .unwrap_err();
        assert!(matches!(err, NotebookError::Credential(_)));
    }

    #[test]
    fn test_transition_labels() {
        assert_eq!(Transition::Delete.verb(), "delete");
        assert_eq!(Transition::Stop.participle(), "Stopping");
    }
}
