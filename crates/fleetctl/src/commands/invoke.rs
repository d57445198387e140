use std::time::Duration;

use anyhow::bail;
use fleet_core::FleetConfig;
use fleet_health::Invoker;

pub async fn invoke(config: &FleetConfig, pod: &str, port: Option<u16>, count: u32) -> anyhow::Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    let identity = super::identity_for(config, pod)?;
    let port = port.unwrap_or(config.invoke.port);
    let namespace = &config.readiness.namespace;
    let invoker = Invoker::new(super::connect().await?, config.invoke.timeout()?);

    let mut latencies = Vec::with_capacity(count as usize);
    for call in 1..=count {
        let result = invoker.invoke(&identity, namespace, port).await?;
        if count == 1 {
            println!("{}", result.body_text());
        }
        println!(
            "[{call}/{count}] {} in {} ms",
            result.status_code,
            result.latency.as_millis()
        );
        latencies.push(result.latency);
    }

    if let Some(summary) = LatencySummary::of(&latencies) {
        if count > 1 {
            println!("{summary}");
        }
    }
    Ok(())
}

/// Min / mean / max over a batch of calls.
#[derive(Debug, PartialEq, Eq)]
struct LatencySummary {
    min: Duration,
    avg: Duration,
    max: Duration,
}

impl LatencySummary {
    fn of(latencies: &[Duration]) -> Option<Self> {
        let min = *latencies.iter().min()?;
        let max = *latencies.iter().max()?;
        let total: Duration = latencies.iter().sum();
        Some(Self {
            min,
            avg: total / latencies.len() as u32,
            max,
        })
    }
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "latency min/avg/max = {}/{}/{} ms",
            self.min.as_millis(),
            self.avg.as_millis(),
            self.max.as_millis()
        )
    }
}
