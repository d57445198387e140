//! Shared types used across fleet crates.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The logical function being provisioned.
///
/// Immutable once a scale request begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub image: String,
    pub image_tag: String,
    pub container_port: u16,
}

impl WorkloadSpec {
    pub fn new(name: &str, image: &str, image_tag: &str, container_port: u16) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            image_tag: image_tag.to_string(),
            container_port,
        }
    }

    /// Full image reference, `image:tag`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.image_tag)
    }

    /// Check the workload can be rendered into a pod manifest.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_dns_label(&self.name) {
            return Err(ValidationError::Name(self.name.clone()));
        }
        if self.image.trim().is_empty() {
            return Err(ValidationError::Image(self.name.clone()));
        }
        if self.container_port == 0 {
            return Err(ValidationError::Port {
                name: self.name.clone(),
                port: u32::from(self.container_port),
            });
        }
        Ok(())
    }
}

/// Input to scale-up: `revisions` instances of one workload.
#[derive(Debug, Clone)]
pub struct ScaleRequest {
    pub spec: WorkloadSpec,
    pub revisions: u32,
    /// Overall deadline for every instance to become ready. Falls back to
    /// the configured readiness timeout when unset.
    pub timeout: Option<Duration>,
}

impl ScaleRequest {
    pub fn new(spec: WorkloadSpec, revisions: u32) -> Self {
        Self {
            spec,
            revisions,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.revisions == 0 {
            return Err(ValidationError::Revisions(self.revisions));
        }
        self.spec.validate()
    }
}

/// Identity of one pod instance.
///
/// `instance_name` (`<base>-<short_id>`) is the manifest file stem and the
/// pod's `metadata.name`. The node agent registers the pod with the control
/// plane under `node_qualified_name` (`<instance_name>-<node>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub base_name: String,
    pub short_id: String,
    pub node_qualified_name: String,
}

impl InstanceIdentity {
    pub fn new(base_name: &str, short_id: &str, node_name: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            short_id: short_id.to_string(),
            node_qualified_name: format!("{base_name}-{short_id}-{node_name}"),
        }
    }

    /// Rebuild an identity from a manifest name (`<base>-<short_id>`) whose
    /// short id has `segments` dash-separated parts.
    pub fn from_instance_name(instance_name: &str, segments: usize, node_name: &str) -> Option<Self> {
        let parts: Vec<&str> = instance_name.rsplitn(segments + 1, '-').collect();
        if segments == 0 || parts.len() != segments + 1 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        let base_name = parts[segments];
        let short_id = parts[..segments].iter().rev().copied().collect::<Vec<_>>().join("-");
        Some(Self::new(base_name, &short_id, node_name))
    }

    /// Name written into the manifest (`metadata.name`).
    pub fn instance_name(&self) -> String {
        format!("{}-{}", self.base_name, self.short_id)
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node_qualified_name)
    }
}

/// A manifest file written for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub path: PathBuf,
    pub content: String,
}

/// Outcome of a single function call.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub latency: Duration,
}

impl InvocationResult {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// RFC 1123 label: lowercase alphanumerics and `-`, alphanumeric at both
/// ends, at most 63 characters.
fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}
