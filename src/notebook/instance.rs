//! Read projections of remote instances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry of a list response, reduced to its name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceSummary {
    pub name: String,
}

/// One page of `instances.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstancePage {
    #[serde(default)]
    pub instances: Vec<InstanceSummary>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Current record of a single instance
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub proxy_uri: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    gce_setup: Option<GceSetupView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GceSetupView {
    #[serde(default)]
    machine_type: Option<String>,
}

impl Instance {
    /// Machine type, shortened from a full URL when the API returns one
    pub fn machine_type(&self) -> Option<&str> {
        self.gce_setup
            .as_ref()
            .and_then(|g| g.machine_type.as_deref())
            .map(|m| m.rsplit('/').next().unwrap_or(m))
    }

    /// `https://` URL of the proxy endpoint, if the instance exposes one
    pub fn access_url(&self) -> Option<String> {
        let uri = self.proxy_uri.as_deref()?.trim();
        let host = uri
            .strip_prefix("https://")
            .or_else(|| uri.strip_prefix("http://"))
            .unwrap_or(uri);

        if host.is_empty() {
            None
        } else {
            Some(format!("https://{}", host))
        }
    }
}
