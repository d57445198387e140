use std::path::Path;

use serde::Serialize;
use tracing::debug;

use fleet_core::{ControlPlane, FleetConfig, InstanceIdentity};
use fleet_manifest::ManifestStore;

/// One manifest on disk and what the control plane says about it.
#[derive(Debug, Serialize)]
struct InstanceRow {
    instance: String,
    pod: String,
    phase: String,
    pod_ip: Option<String>,
    manifest: String,
}

pub async fn status(config: &FleetConfig, name: &str, format: &str) -> anyhow::Result<()> {
    let store = ManifestStore::from_config(config);
    let paths = store.list(name)?;
    if paths.is_empty() {
        println!("No manifests for {name} in {}", store.dir().display());
        return Ok(());
    }

    let control_plane = super::connect().await?;
    let mut rows = Vec::with_capacity(paths.len());
    for path in &paths {
        let manifest = store.read(path)?;
        let identity = super::identity_for(config, &manifest.metadata.name)?;
        rows.push(row(control_plane.as_ref(), &config.readiness.namespace, &identity, path).await);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            println!("{:<32} {:<10} {:<16} MANIFEST", "INSTANCE", "PHASE", "IP");
            for r in &rows {
                println!(
                    "{:<32} {:<10} {:<16} {}",
                    r.instance,
                    r.phase,
                    r.pod_ip.as_deref().unwrap_or("-"),
                    r.manifest
                );
            }
        }
    }
    Ok(())
}

async fn row(
    control_plane: &dyn ControlPlane,
    namespace: &str,
    identity: &InstanceIdentity,
    path: &Path,
) -> InstanceRow {
    let (phase, pod_ip) = match control_plane.pod_status(namespace, &identity.node_qualified_name).await {
        Ok(status) => (status.phase.to_string(), status.pod_ip),
        Err(e) if e.is_not_found() => ("NotFound".to_string(), None),
        Err(e) => {
            debug!(pod = %identity, error = %e, "status query failed");
            ("Error".to_string(), None)
        }
    };
    InstanceRow {
        instance: identity.instance_name(),
        pod: identity.node_qualified_name.clone(),
        phase,
        pod_ip,
        manifest: path.display().to_string(),
    }
}
