//! Error types shared across fleet crates.

use thiserror::Error;

/// Errors returned by a [`ControlPlane`](crate::ControlPlane) query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The object is not registered (yet).
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// The control plane answered with a non-success status.
    #[error("control plane returned {code}: {message}")]
    Api { code: u16, message: String },

    /// The control plane could not be reached.
    #[error("control plane unreachable: {0}")]
    Transport(String),
}

impl ControlPlaneError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A workload or scale request that cannot be turned into pods.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid workload name {0:?}: must be a lowercase DNS label")]
    Name(String),

    #[error("workload {0} has an empty image")]
    Image(String),

    #[error("workload {name} has an invalid container port {port}")]
    Port { name: String, port: u32 },

    #[error("revision count must be at least 1, got {0}")]
    Revisions(u32),
}

/// Errors loading `fleet.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration {value:?} for {field}")]
    Duration { field: &'static str, value: String },

    #[error("unable to determine node name; set [naming] node_name or NODE_NAME")]
    NodeName,

    /// Every short id needs at least one segment, each at least one character long.
    #[error("invalid naming.id_lengths {0:?}: expected non-zero segment lengths")]
    IdLengths(Vec<usize>),
}
