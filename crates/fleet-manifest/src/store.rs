//! The node agent's manifest directory.
//!
//! Writers never share a path: every instance name carries its own random
//! id. Listing takes a snapshot of the directory and tolerates files
//! appearing or disappearing underneath it.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use fleet_core::ident::{ALPHABET, DEFAULT_SEGMENTS};
use fleet_core::{FleetConfig, ManifestRecord, WorkloadSpec};

use crate::error::{ManifestError, ManifestResult};
use crate::render::PodManifest;

const MANIFEST_EXT: &str = "yaml";

/// Handle to a directory of static pod manifests.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
    /// Short id shape of the instances this store owns.
    id_segments: Vec<usize>,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            id_segments: DEFAULT_SEGMENTS.to_vec(),
        }
    }

    /// Directory and id shape from `[manifests]` and `[naming]`.
    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(&config.manifests.dir).with_id_segments(&config.naming.id_lengths)
    }

    /// Only files named `<workload>-<id>.yaml`, with `<id>` made of these
    /// segment lengths, belong to a workload.
    pub fn with_id_segments(mut self, segments: &[usize]) -> Self {
        self.id_segments = segments.to_vec();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn id_segments(&self) -> &[usize] {
        &self.id_segments
    }

    /// Path of the manifest for `instance_name`.
    pub fn path_for(&self, instance_name: &str) -> PathBuf {
        self.dir.join(format!("{instance_name}.{MANIFEST_EXT}"))
    }

    /// Render and write the manifest for one instance.
    ///
    /// The document is written to a hidden temp file in the same directory,
    /// synced, then renamed into place, so the node agent never observes a
    /// partial file.
    pub fn write(&self, workload: &WorkloadSpec, instance_name: &str) -> ManifestResult<ManifestRecord> {
        let path = self.path_for(instance_name);
        let content = PodManifest::for_instance(workload, instance_name).to_yaml()?;

        let write_err = |source: std::io::Error| ManifestError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{instance_name}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        set_readable(tmp.path()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), "pod manifest written");
        Ok(ManifestRecord { path, content })
    }

    /// Read back a manifest written by [`write`](Self::write).
    pub fn read(&self, path: &Path) -> ManifestResult<PodManifest> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        PodManifest::from_yaml(&content)
    }

    /// Snapshot of every manifest belonging to `workload`, sorted by path.
    ///
    /// A missing directory holds no manifests.
    pub fn list(&self, workload: &str) -> ManifestResult<Vec<PathBuf>> {
        self.matching(workload).map_err(|source| ManifestError::Read {
            path: self.dir.clone(),
            source,
        })
    }

    /// Delete every manifest belonging to `workload`.
    ///
    /// Files that vanish between listing and deletion count as removed, so
    /// repeating a scale-down is always safe. Stops at the first other
    /// failure; files not yet visited stay on disk.
    pub fn scale_down(&self, workload: &str) -> ManifestResult<usize> {
        self.remove_each(workload, |path| std::fs::remove_file(path))
    }

    fn remove_each(
        &self,
        workload: &str,
        mut remove: impl FnMut(&Path) -> std::io::Result<()>,
    ) -> ManifestResult<usize> {
        let files = self.list(workload)?;
        let mut removed = 0;

        for path in files {
            match remove(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), "pod manifest removed");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "pod manifest already gone");
                }
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "failed to remove pod manifest");
                    return Err(ManifestError::Cleanup { path, source });
                }
            }
        }

        info!(%workload, removed, "scaled down");
        Ok(removed)
    }

    fn matching(&self, workload: &str) -> std::io::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                // Removed between readdir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.owns(workload, name) {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Whether `file_name` is `<workload>-<short id>.yaml` for this store's
    /// id shape. `fn-api-<id>.yaml` never belongs to `fn`.
    fn owns(&self, workload: &str, file_name: &str) -> bool {
        let Some(short_id) = file_name
            .strip_suffix(&format!(".{MANIFEST_EXT}"))
            .and_then(|stem| stem.strip_prefix(workload))
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return false;
        };

        let segments: Vec<&str> = short_id.split('-').collect();
        segments.len() == self.id_segments.len()
            && segments
                .iter()
                .zip(&self.id_segments)
                .all(|(segment, &len)| segment.len() == len && segment.bytes().all(|b| ALPHABET.contains(&b)))
    }
}

#[cfg(unix)]
fn set_readable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
