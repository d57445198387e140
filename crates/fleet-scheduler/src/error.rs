//! Scheduler error types.

use thiserror::Error;

use fleet_core::{InstanceIdentity, ValidationError};
use fleet_health::ReadinessError;
use fleet_manifest::ManifestError;

/// Why a single instance could not be brought up.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    /// The creation task ended without reporting (panicked or was aborted).
    #[error("instance task ended without reporting an outcome")]
    Aborted,
}

impl InstanceError {
    /// Whether this instance was stopped because a sibling failed first.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InstanceError::Readiness(ReadinessError::Cancelled { .. }))
    }
}

/// One failed revision within a scale-up.
#[derive(Debug)]
pub struct InstanceFailure {
    pub revision: u32,
    pub identity: Option<InstanceIdentity>,
    pub error: InstanceError,
}

/// Errors that can occur during scaling operations.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("invalid scale request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// At least one instance failed; the request was rolled back.
    #[error(
        "scale-up of {workload} failed for {} of {requested} instances: {}{}",
        .failures.len(),
        first_cause(.failures),
        rollback_suffix(.rollback)
    )]
    Creation {
        workload: String,
        requested: u32,
        /// In arrival order; cancelled siblings come after the root cause.
        failures: Vec<InstanceFailure>,
        /// Set when rollback itself failed; some manifests may remain.
        rollback: Option<ManifestError>,
    },
}

impl ScaleError {
    /// The failure that triggered the rollback.
    pub fn root_cause(&self) -> Option<&InstanceFailure> {
        match self {
            ScaleError::InvalidRequest(_) => None,
            ScaleError::Creation { failures, .. } => failures
                .iter()
                .find(|f| !f.error.is_cancelled())
                .or_else(|| failures.first()),
        }
    }

    pub fn rollback_error(&self) -> Option<&ManifestError> {
        match self {
            ScaleError::Creation { rollback, .. } => rollback.as_ref(),
            ScaleError::InvalidRequest(_) => None,
        }
    }
}

fn first_cause(failures: &[InstanceFailure]) -> String {
    failures
        .iter()
        .find(|f| !f.error.is_cancelled())
        .or_else(|| failures.first())
        .map(|f| f.error.to_string())
        .unwrap_or_default()
}

fn rollback_suffix(rollback: &Option<ManifestError>) -> String {
    match rollback {
        Some(e) => format!("; rollback also failed: {e}"),
        None => String::new(),
    }
}
