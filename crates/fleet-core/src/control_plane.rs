//! The control-plane seam.
//!
//! The fleet never talks to the node agent directly. Readiness and
//! addressing are observed only through this trait, which `fleet-kube`
//! implements against a real cluster and tests replace with scripted fakes.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ControlPlaneError;

/// Pod lifecycle phase as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Map the control plane's `status.phase` string.
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Phases a pod never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// The subset of pod status the fleet cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodStatus {
    pub phase: PodPhase,
    pub pod_ip: Option<String>,
}

impl PodStatus {
    pub fn new(phase: PodPhase) -> Self {
        Self {
            phase,
            pod_ip: None,
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.pod_ip = Some(ip.to_string());
        self
    }
}

/// Narrow read/write API onto the cluster control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Look up a pod by name. A pod that is not registered yet is reported
    /// as [`ControlPlaneError::NotFound`].
    async fn pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus, ControlPlaneError>;

    /// Create `namespace` unless it already exists.
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ControlPlaneError>;
}
