pub mod invoke;
pub mod scale;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use fleet_core::{ControlPlane, FleetConfig, InstanceIdentity};
use fleet_kube::KubeControlPlane;

/// Command-line values that win over `fleet.toml`.
#[derive(Debug, Default)]
pub struct Overrides {
    pub manifest_dir: Option<PathBuf>,
    pub node_name: Option<String>,
    pub namespace: Option<String>,
}

/// Load `fleet.toml` (or defaults) and apply flag overrides.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<FleetConfig> {
    let mut config = match path {
        Some(path) => FleetConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => FleetConfig::default(),
    };

    if let Some(dir) = overrides.manifest_dir {
        config.manifests.dir = dir;
    }
    if let Some(node) = overrides.node_name {
        config.naming.node_name = Some(node);
    }
    if let Some(namespace) = overrides.namespace {
        config.readiness.namespace = namespace;
    }

    config.validate()?;
    Ok(config)
}

async fn connect() -> anyhow::Result<Arc<dyn ControlPlane>> {
    let control_plane = KubeControlPlane::connect()
        .await
        .context("failed to reach the cluster API")?;
    Ok(Arc::new(control_plane))
}

/// Identity of an instance given its manifest name.
fn identity_for(config: &FleetConfig, instance_name: &str) -> anyhow::Result<InstanceIdentity> {
    let node = config.node_name()?;
    InstanceIdentity::from_instance_name(instance_name, config.naming.id_lengths.len(), &node)
        .with_context(|| format!("{instance_name:?} is not an instance name"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(
            &path,
            "[manifests]\ndir = \"/srv/manifests\"\n[readiness]\nnamespace = \"fns\"\n",
        )
        .unwrap();

        let config = load_config(
            Some(path.as_path()),
            Overrides {
                node_name: Some("worker-3".to_string()),
                namespace: Some("staging".to_string()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.manifests.dir, PathBuf::from("/srv/manifests"));
        assert_eq!(config.readiness.namespace, "staging");
        assert_eq!(config.node_name().unwrap(), "worker-3");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("nope.toml").as_path()), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("failed to load"));
    }

    #[test]
    fn identity_uses_configured_segments() {
        let mut config = FleetConfig::default();
        config.naming.node_name = Some("node-a".to_string());

        let id = identity_for(&config, "hello-abcdefghi-jklmn").unwrap();
        assert_eq!(id.node_qualified_name, "hello-abcdefghi-jklmn-node-a");
        assert!(identity_for(&config, "hello").is_err());
    }
}
