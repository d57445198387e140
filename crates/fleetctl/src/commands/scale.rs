use std::time::Duration;

use anyhow::{Context, bail};
use fleet_core::config::parse_duration;
use fleet_core::{FleetConfig, ScaleRequest, WorkloadSpec};
use fleet_health::{Invoker, ReadinessPoller, ReadinessPolicy};
use fleet_manifest::ManifestStore;
use fleet_scheduler::{Scaler, ScalerOptions};
use tracing::info;

pub struct ScaleUpArgs {
    pub name: String,
    pub image: String,
    pub tag: String,
    pub port: Option<u16>,
    pub revisions: u32,
    pub timeout: Option<String>,
    pub create_namespace: bool,
    pub fail_fast: bool,
    pub invoke: bool,
}

pub async fn scale_up(mut config: FleetConfig, args: ScaleUpArgs) -> anyhow::Result<()> {
    if args.fail_fast {
        config.scale.fail_fast = true;
    }
    let port = args.port.unwrap_or(config.invoke.port);
    let mut request = ScaleRequest::new(WorkloadSpec::new(&args.name, &args.image, &args.tag, port), args.revisions);
    if let Some(timeout) = &args.timeout {
        request = request.with_timeout(timeout_arg(timeout)?);
    }

    let control_plane = super::connect().await?;
    let namespace = config.readiness.namespace.clone();
    if args.create_namespace {
        control_plane
            .ensure_namespace(&namespace)
            .await
            .with_context(|| format!("failed to create namespace {namespace}"))?;
    }

    let poller = ReadinessPoller::new(
        control_plane.clone(),
        &namespace,
        ReadinessPolicy::from_config(&config.readiness)?,
    );
    let scaler = Scaler::new(
        ManifestStore::from_config(&config),
        poller,
        ScalerOptions::from_config(&config)?,
    );

    // Dropping the scale-up on interrupt aborts its tasks and rolls back.
    let outcome = tokio::select! {
        result = scaler.scale_up(&request) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(workload = %args.name, "interrupt received");
            bail!("scale-up of {} interrupted and rolled back", args.name);
        }
    };

    let created = match outcome.into_result() {
        Ok(created) => created,
        Err(e) => {
            eprintln!("✗ {e}");
            bail!("scale-up of {} rolled back", args.name);
        }
    };

    for instance in &created {
        println!(
            "✓ {} running at {} ({} ms)",
            instance.identity.instance_name(),
            instance.pod_ip.as_deref().unwrap_or("-"),
            instance.startup.as_millis()
        );
    }

    if args.invoke {
        let invoker = Invoker::new(control_plane, config.invoke.timeout()?);
        for instance in &created {
            let result = invoker.invoke(&instance.identity, &namespace, port).await?;
            println!(
                "  {} → {} in {} ms",
                instance.identity.instance_name(),
                result.status_code,
                result.latency.as_millis()
            );
        }
    }

    println!("✓ {} instances of {} ready", created.len(), args.name);
    Ok(())
}

pub fn scale_down(config: &FleetConfig, name: &str) -> anyhow::Result<()> {
    let store = ManifestStore::from_config(config);
    let removed = store.scale_down(name)?;
    println!("✓ Removed {removed} manifests of {name}");
    Ok(())
}

fn timeout_arg(value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).with_context(|| format!("invalid timeout {value:?}, expected e.g. \"90s\""))
}
