//! Manifest error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while writing, reading, or removing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Writing one instance's manifest failed. Fatal for that instance only.
    #[error("failed to write pod manifest {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing the directory or reading a manifest back failed.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render pod manifest: {0}")]
    Render(String),

    #[error("failed to parse pod manifest: {0}")]
    Parse(String),

    /// Scale-down stopped early; files after `path` may remain.
    #[error("failed to remove pod manifest {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
