//! GCP Authentication
//!
//! Loads the identity used to sign API calls: a service account key file,
//! Application Default Credentials, or a pre-minted bearer token.

use crate::error::{NotebookError, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Where the identity for a session comes from
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service account key JSON on disk
    KeyFile(PathBuf),
    /// Application Default Credentials (gcloud, metadata server, ...)
    ApplicationDefault,
    /// Bearer token supplied by the caller
    AccessToken(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            CredentialSource::ApplicationDefault => f.write_str("ApplicationDefault"),
            CredentialSource::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

/// A loaded identity able to produce access tokens
#[derive(Clone)]
pub struct Credential {
    source: TokenSource,
}

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            TokenSource::Provider(_) => "provider",
            TokenSource::Static(_) => "static",
        };
        f.debug_struct("Credential").field("kind", &kind).finish()
    }
}

impl Credential {
    /// Load a service account key from `path`
    ///
    /// Only the local file is read; no network call is made until a token is requested.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading service account key from {}", path.display());

        let json = std::fs::read_to_string(path).map_err(|e| {
            NotebookError::Credential(format!("cannot read {}: {}", path.display(), e))
        })?;

        let account = CustomServiceAccount::from_json(&json).map_err(|e| {
            NotebookError::Credential(format!("malformed key file {}: {}", path.display(), e))
        })?;

        Ok(Self {
            source: TokenSource::Provider(Arc::new(account)),
        })
    }

    /// Discover Application Default Credentials
    pub async fn application_default() -> Result<Self> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            NotebookError::Credential(format!(
                "no application default credentials ({}). Run 'gcloud auth application-default login'",
                e
            ))
        })?;

        Ok(Self {
            source: TokenSource::Provider(provider),
        })
    }

    /// Use a bearer token as-is
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
        }
    }

    /// Resolve a [`CredentialSource`] into a usable credential
    pub async fn resolve(source: &CredentialSource) -> Result<Self> {
        match source {
            CredentialSource::KeyFile(path) => Self::load(path),
            CredentialSource::ApplicationDefault => Self::application_default().await,
            CredentialSource::AccessToken(token) if token.trim().is_empty() => Err(
                NotebookError::Credential("access token is empty".to_string()),
            ),
            CredentialSource::AccessToken(token) => Ok(Self::from_access_token(token.trim())),
        }
    }

    /// Get an access token for API calls
    pub async fn access_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Provider(provider) => {
                let token = provider.token(DEFAULT_SCOPES).await.map_err(|e| {
                    NotebookError::Credential(format!("failed to get access token: {}", e))
                })?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_is_credential_error() {
        let err = Credential::load("/definitely/not/here/key.json").unwrap_err();
        assert!(matches!(err, NotebookError::Credential(_)));
        assert!(err.to_string().contains("/definitely/not/here/key.json"));
    }

    #[test]
    fn test_load_malformed_file_is_credential_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"type\": \"service_account\"").unwrap();

        let err = Credential::load(file.path()).unwrap_err();
        assert!(matches!(err, NotebookError::Credential(msg) if msg.contains("malformed")));
    }

    #[tokio::test]
    async fn test_static_token_is_returned_verbatim() {
        let credential = Credential::resolve(&CredentialSource::AccessToken(" tok-123 \n".into()))
            .await
            .unwrap();
        assert_eq!(credential.access_token().await.unwrap(), "tok-123");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_rejected() {
        let err = Credential::resolve(&CredentialSource::AccessToken("  ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, NotebookError::Credential(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let source = CredentialSource::AccessToken("secret".into());
        assert!(!format!("{:?}", source).contains("secret"));
    }
}
