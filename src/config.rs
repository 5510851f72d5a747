//! Configuration Management
//!
//! Settings come from (highest first) command-line flags, the YAML settings
//! file, the environment / gcloud configuration, and built-in defaults. The
//! resolved values are handed to [`ClientFactory`](crate::gcp::client::ClientFactory)
//! as a [`ClientConfig`]; nothing below reads global state afterwards.

use crate::gcp::auth::CredentialSource;
use crate::gcp::client::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use crate::notebook::TemplateConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location used when nothing else is configured
pub const DEFAULT_LOCATION: &str = "us-central1-a";

/// Contents of `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub template: TemplateConfig,
}

/// Values given on the command line, each overriding the settings file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
}

/// Fully resolved configuration for one invocation
#[derive(Debug, Clone)]
pub struct Resolved {
    pub project_id: String,
    pub location: String,
    pub client: ClientConfig,
    pub template: TemplateConfig,
}

impl Settings {
    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nbctl").join("config.yaml"))
    }

    /// Load settings
    ///
    /// An explicit `path` must exist. The default path is optional and a
    /// missing file yields default settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Get effective project (CLI > settings > environment/gcloud default)
    pub fn effective_project(&self, overrides: &Overrides) -> Option<String> {
        overrides
            .project_id
            .clone()
            .or_else(|| self.project_id.clone())
            .or_else(gcloud::default_project)
    }

    /// Get effective location (CLI > settings > gcloud default > us-central1-a)
    pub fn effective_location(&self, overrides: &Overrides) -> String {
        overrides
            .location
            .clone()
            .or_else(|| self.location.clone())
            .or_else(gcloud::default_zone)
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
    }

    /// Token > key file (CLI > settings > GOOGLE_APPLICATION_CREDENTIALS) > ADC
    pub fn credential_source(&self, overrides: &Overrides) -> CredentialSource {
        if let Some(token) = &overrides.access_token {
            return CredentialSource::AccessToken(token.clone());
        }

        overrides
            .credentials_path
            .clone()
            .or_else(|| self.credentials_path.clone())
            .or_else(|| std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from))
            .map(CredentialSource::KeyFile)
            .unwrap_or(CredentialSource::ApplicationDefault)
    }

    /// Combine settings and overrides into the values a call needs
    pub fn resolve(&self, overrides: &Overrides) -> Result<Resolved> {
        let project_id = self.effective_project(overrides).ok_or_else(|| {
            anyhow::anyhow!(
                "No GCP project configured. Set GOOGLE_CLOUD_PROJECT, add project_id to the settings file or use --project"
            )
        })?;
        let location = self.effective_location(overrides);

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let timeout = self
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let client = ClientConfig::new(self.credential_source(overrides))
            .with_endpoint(endpoint)
            .with_request_timeout(timeout);

        Ok(Resolved {
            project_id,
            location,
            client,
            template: self.template.clone(),
        })
    }
}

/// Defaults read from the environment and the gcloud CLI configuration
pub mod gcloud {
    use std::path::PathBuf;

    /// Get the gcloud configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join("gcloud"))
    }

    /// Validate a GCP project ID format
    /// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
    /// Must start with a letter and cannot end with a hyphen
    pub fn validate_project_id(project: &str) -> bool {
        if project.len() < 6 || project.len() > 30 {
            return false;
        }
        if !project.starts_with(|c: char| c.is_ascii_lowercase()) || project.ends_with('-') {
            return false;
        }
        project
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// Read `key` from `[section]` of an INI-style gcloud file
    ///
    /// Keys before any section header belong to `core`, matching the legacy
    /// `properties` file.
    pub fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
        let mut current = "core".to_string();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                continue;
            }
            if current != section {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                if k.trim() == key {
                    let value = v.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }

        None
    }

    /// Contents of the active gcloud configuration file
    fn active_configuration() -> Option<String> {
        let dir = config_dir()?;
        let name = std::fs::read_to_string(dir.join("active_config")).ok()?;
        let name = name.trim();

        // Prevent path traversal through the config name
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            tracing::warn!("Invalid characters in active_config name");
            return None;
        }

        std::fs::read_to_string(dir.join("configurations").join(format!("config_{}", name))).ok()
    }

    /// Default project from the environment or gcloud configuration
    /// Invalid project IDs are skipped
    pub fn default_project() -> Option<String> {
        for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
            if let Ok(project) = std::env::var(var) {
                if validate_project_id(&project) {
                    return Some(project);
                }
                tracing::warn!("Invalid project ID format in {}", var);
            }
        }

        let from_properties = config_dir()
            .and_then(|dir| std::fs::read_to_string(dir.join("properties")).ok())
            .and_then(|content| ini_value(&content, "core", "project"));

        from_properties
            .or_else(|| active_configuration().and_then(|c| ini_value(&c, "core", "project")))
            .filter(|p| validate_project_id(p))
    }

    /// Default zone from the environment or gcloud configuration
    pub fn default_zone() -> Option<String> {
        if let Ok(zone) = std::env::var("CLOUDSDK_COMPUTE_ZONE") {
            return Some(zone);
        }
        active_configuration().and_then(|c| ini_value(&c, "compute", "zone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_project_id() {
        assert!(gcloud::validate_project_id("my-project-123"));
        assert!(!gcloud::validate_project_id("short"));
        assert!(!gcloud::validate_project_id("1starts-with-digit"));
        assert!(!gcloud::validate_project_id("ends-with-hyphen-"));
        assert!(!gcloud::validate_project_id("Has-Uppercase"));
    }

    #[test]
    fn test_ini_value_sections() {
        let content = "\
# comment
[core]
account = me@example.com
project = my-project-123

[compute]
zone = europe-west4-a
";
        assert_eq!(
            gcloud::ini_value(content, "core", "project").as_deref(),
            Some("my-project-123")
        );
        assert_eq!(
            gcloud::ini_value(content, "compute", "zone").as_deref(),
            Some("europe-west4-a")
        );
        assert_eq!(gcloud::ini_value(content, "compute", "project"), None);
        assert_eq!(
            gcloud::ini_value("project = legacy-project\n", "core", "project").as_deref(),
            Some("legacy-project")
        );
    }

    #[test]
    fn test_settings_from_yaml() {
        let settings = Settings::from_yaml(
            "project_id: proj-from-file\nlocation: us-west1-b\nrequest_timeout_secs: 5\ntemplate:\n  machine_shape: n1-standard-4\n",
        )
        .unwrap();
        assert_eq!(settings.project_id.as_deref(), Some("proj-from-file"));
        assert_eq!(settings.template.machine_shape, "n1-standard-4");
        assert!(!settings.template.public_ip_enabled);
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let settings = Settings {
            project_id: Some("proj-from-file".into()),
            location: Some("us-west1-b".into()),
            credentials_path: Some("/etc/key.json".into()),
            request_timeout_secs: Some(5),
            ..Default::default()
        };
        let overrides = Overrides {
            project_id: Some("proj-from-cli".into()),
            access_token: Some("tok".into()),
            endpoint: Some("http://localhost:8080".into()),
            ..Default::default()
        };

        let resolved = settings.resolve(&overrides).unwrap();
        assert_eq!(resolved.project_id, "proj-from-cli");
        assert_eq!(resolved.location, "us-west1-b");
        assert_eq!(resolved.client.endpoint, "http://localhost:8080");
        assert_eq!(resolved.client.request_timeout, Duration::from_secs(5));
        assert_eq!(
            resolved.client.credentials,
            CredentialSource::AccessToken("tok".into())
        );
    }

    #[test]
    fn test_key_file_from_settings() {
        let settings = Settings {
            credentials_path: Some("/etc/key.json".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.credential_source(&Overrides::default()),
            CredentialSource::KeyFile("/etc/key.json".into())
        );
    }

    #[test]
    fn test_explicit_settings_path_must_exist() {
        assert!(Settings::load(Some(Path::new("/no/such/config.yaml"))).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "location: asia-east1-a").unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.location.as_deref(), Some("asia-east1-a"));
    }
}
