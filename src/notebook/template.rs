//! Instance template
//!
//! The desired-state body submitted with a create request. Defaults live in
//! [`TemplateConfig`]; any field can be overridden from the config file.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_MACHINE_SHAPE: &str = "e2-standard-4";
pub const DEFAULT_IMAGE_REPOSITORY: &str = "gcr.io/deeplearning-platform-release/workbench-container";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
pub const DEFAULT_NETWORK: &str = "global/networks/default";

/// Override points for created instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub machine_shape: String,
    pub image_repository: String,
    pub image_tag: String,
    /// Instances get an internal IP only unless this is set
    pub public_ip_enabled: bool,
    pub network: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            machine_shape: DEFAULT_MACHINE_SHAPE.to_string(),
            image_repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            public_ip_enabled: false,
            network: DEFAULT_NETWORK.to_string(),
        }
    }
}

impl TemplateConfig {
    /// Build a fresh template from this configuration
    pub fn build(&self) -> InstanceTemplate {
        InstanceTemplate {
            gce_setup: GceSetup {
                machine_type: self.machine_shape.clone(),
                container_image: ContainerImage {
                    repository: self.image_repository.clone(),
                    tag: self.image_tag.clone(),
                },
                network_interfaces: vec![NetworkInterface {
                    network: self.network.clone(),
                }],
                disable_public_ip: !self.public_ip_enabled,
            },
        }
    }
}

/// Body of a Notebooks v2 `Instance` for creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTemplate {
    gce_setup: GceSetup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GceSetup {
    machine_type: String,
    container_image: ContainerImage,
    network_interfaces: Vec<NetworkInterface>,
    disable_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContainerImage {
    repository: String,
    tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NetworkInterface {
    network: String,
}

impl InstanceTemplate {
    /// Request body in the Notebooks v2 wire shape
    pub fn to_json(&self) -> Value {
        let setup = &self.gce_setup;
        let interfaces: Vec<Value> = setup
            .network_interfaces
            .iter()
            .map(|n| json!({ "network": n.network }))
            .collect();

        json!({
            "gceSetup": {
                "machineType": setup.machine_type,
                "containerImage": {
                    "repository": setup.container_image.repository,
                    "tag": setup.container_image.tag,
                },
                "networkInterfaces": interfaces,
                "disablePublicIp": setup.disable_public_ip,
            }
        })
    }

    pub fn machine_shape(&self) -> &str {
        &self.gce_setup.machine_type
    }

    /// `repository:tag`
    pub fn image_reference(&self) -> String {
        let image = &self.gce_setup.container_image;
        format!("{}:{}", image.repository, image.tag)
    }

    pub fn public_ip_enabled(&self) -> bool {
        !self.gce_setup.disable_public_ip
    }

    pub fn network(&self) -> Option<&str> {
        self.gce_setup
            .network_interfaces
            .first()
            .map(|n| n.network.as_str())
    }
}
