//! Resource naming
//!
//! Instances are addressed as `projects/{project}/locations/{location}/instances/{id}`.

use std::fmt;

/// `projects/{project}/locations/{location}`, the parent used for list and create
pub fn parent_path(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

/// Fully-qualified name of an instance
pub fn instance_name(project: &str, location: &str, instance_id: &str) -> ResourceName {
    ResourceName::new(project, location, instance_id)
}

/// Fully-qualified instance name, always rebuilt from its three parts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    project: String,
    location: String,
    instance_id: String,
}

impl ResourceName {
    pub fn new(project: &str, location: &str, instance_id: &str) -> Self {
        Self {
            project: project.to_string(),
            location: location.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    /// Split a name produced by the API back into its parts
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "instances", id]
                if !project.is_empty() && !location.is_empty() && !id.is_empty() =>
            {
                Some(Self::new(project, location, id))
            }
            _ => None,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn parent(&self) -> String {
        parent_path(&self.project, &self.location)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/instances/{}", self.parent(), self.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name_format() {
        let name = instance_name("proj1", "us-central1-a", "nb-1");
        assert_eq!(
            name.to_string(),
            "projects/proj1/locations/us-central1-a/instances/nb-1"
        );
        assert_eq!(name.parent(), "projects/proj1/locations/us-central1-a");
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(ResourceName::parse("projects/p/locations/l/operations/op-1").is_none());
        assert!(ResourceName::parse("projects/p/locations/l/instances/").is_none());
        assert!(ResourceName::parse("projects/p/locations/l/instances/a/b").is_none());
    }

    #[test]
    fn test_parse_roundtrip() {
        let name = ResourceName::parse("projects/p/locations/l/instances/nb").unwrap();
        assert_eq!(name, instance_name("p", "l", "nb"));
    }
}
