//! Readiness and invocation error types.

use std::time::Duration;

use thiserror::Error;

use fleet_core::{ControlPlaneError, PodPhase};

pub type ReadinessResult<T> = Result<T, ReadinessError>;
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Why an instance never reached `Running`.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("pod {name} not running after {waited:?} (last phase {last_phase})")]
    Timeout {
        name: String,
        waited: Duration,
        last_phase: PodPhase,
    },

    #[error("control plane failed {attempts} times in a row for pod {name}: {source}")]
    ControlPlane {
        name: String,
        attempts: u32,
        #[source]
        source: ControlPlaneError,
    },

    #[error("pod {name} reached terminal phase {phase}")]
    PodFailed { name: String, phase: PodPhase },

    #[error("readiness wait for pod {name} was cancelled")]
    Cancelled { name: String },
}

/// Why a function call could not be completed.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("pod {name} has no address yet")]
    AddressUnavailable { name: String },

    #[error("failed to resolve pod {name}: {source}")]
    ControlPlane {
        name: String,
        #[source]
        source: ControlPlaneError,
    },

    #[error("invocation of {uri} failed: {reason}")]
    Invocation { uri: String, reason: String },
}
