//! Pod document rendering and parsing.
//!
//! The document shape is fixed: one container, one port, no volumes,
//! labels, or probes.

use serde::{Deserialize, Serialize};

use fleet_core::WorkloadSpec;

use crate::error::{ManifestError, ManifestResult};

/// Pull policy written into every manifest. Images are pulled once per node.
pub const IMAGE_PULL_POLICY: &str = "IfNotPresent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub image_pull_policy: String,
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
}

impl PodManifest {
    /// Build the pod document for one instance of `workload`.
    pub fn for_instance(workload: &WorkloadSpec, instance_name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata: Metadata {
                name: instance_name.to_string(),
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: workload.name.clone(),
                    image: workload.image_ref(),
                    image_pull_policy: IMAGE_PULL_POLICY.to_string(),
                    ports: vec![ContainerPort {
                        container_port: workload.container_port,
                    }],
                }],
            },
        }
    }

    pub fn to_yaml(&self) -> ManifestResult<String> {
        serde_yaml::to_string(self).map_err(|e| ManifestError::Render(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> ManifestResult<Self> {
        serde_yaml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Recover the workload a manifest was rendered from.
    pub fn workload(&self) -> ManifestResult<WorkloadSpec> {
        let container = self
            .spec
            .containers
            .first()
            .ok_or_else(|| ManifestError::Parse("pod has no containers".to_string()))?;
        let port = container
            .ports
            .first()
            .ok_or_else(|| ManifestError::Parse("container has no ports".to_string()))?;
        let (image, tag) = split_image_ref(&container.image);

        Ok(WorkloadSpec {
            name: container.name.clone(),
            image: image.to_string(),
            image_tag: tag.to_string(),
            container_port: port.container_port,
        })
    }
}

/// Split `repo[:port]/name:tag` into image and tag. A missing tag means `latest`.
fn split_image_ref(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (image, "latest"),
    }
}
