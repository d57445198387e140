//! Fans out instance creation and rolls back partial scale-ups.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fleet_core::ident::DEFAULT_SEGMENTS;
use fleet_core::{ConfigError, FleetConfig, IdGenerator, InstanceIdentity, ScaleRequest, WorkloadSpec};
use fleet_health::ReadinessPoller;
use fleet_manifest::{ManifestResult, ManifestStore};

use crate::error::{InstanceError, InstanceFailure, ScaleError};

/// Naming and timing knobs for a [`Scaler`].
#[derive(Debug, Clone)]
pub struct ScalerOptions {
    /// Suffix the node agent appends to mirror pod names.
    pub node_name: String,
    /// Random segment lengths composed into each instance's short id.
    pub id_segments: Vec<usize>,
    /// Deadline for readiness when a request carries none.
    pub readiness_timeout: Duration,
    /// Cancel pending siblings as soon as one instance fails.
    pub fail_fast: bool,
}

impl ScalerOptions {
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            id_segments: DEFAULT_SEGMENTS.to_vec(),
            readiness_timeout: Duration::from_secs(120),
            fail_fast: false,
        }
    }

    pub fn from_config(config: &FleetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            node_name: config.node_name()?,
            id_segments: config.naming.id_lengths.clone(),
            readiness_timeout: config.readiness.timeout()?,
            fail_fast: config.scale.fail_fast,
        })
    }
}

/// An instance that reached `Running`.
#[derive(Debug, Clone)]
pub struct ReadyInstance {
    pub identity: InstanceIdentity,
    pub manifest: PathBuf,
    pub pod_ip: Option<String>,
    /// Manifest write to observed `Running`.
    pub startup: Duration,
}

/// Outcome of one scale-up request.
///
/// On error `created` is always empty: partial results are rolled back.
#[derive(Debug)]
pub struct ScaleResult {
    pub created: Vec<ReadyInstance>,
    pub error: Option<ScaleError>,
}

impl ScaleResult {
    fn failed(error: ScaleError) -> Self {
        Self {
            created: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Identities in revision order.
    pub fn identities(&self) -> Vec<&InstanceIdentity> {
        self.created.iter().map(|i| &i.identity).collect()
    }

    pub fn into_result(self) -> Result<Vec<ReadyInstance>, ScaleError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.created),
        }
    }
}

/// Per-task report sent back to the join point.
struct Outcome {
    revision: u32,
    identity: InstanceIdentity,
    result: Result<ReadyInstance, InstanceError>,
}

/// Rolls a workload back unless disarmed.
///
/// Held across the join in [`Scaler::scale_up`] so that dropping the
/// future mid-flight (timeout, Ctrl-C) still removes what was written.
/// Declared before the task set, so the tasks are aborted first.
struct RollbackGuard<'a> {
    store: &'a ManifestStore,
    workload: &'a str,
    armed: bool,
}

impl RollbackGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(workload = %self.workload, "scale-up abandoned, rolling back");
        match self.store.scale_down(self.workload) {
            Ok(removed) => info!(workload = %self.workload, removed, "rollback complete"),
            Err(e) => error!(workload = %self.workload, error = %e, "rollback failed, manifests may remain"),
        }
    }
}

/// Brings workloads up and down as static pods on this node.
#[derive(Clone)]
pub struct Scaler {
    store: ManifestStore,
    poller: ReadinessPoller,
    ids: Arc<IdGenerator>,
    options: ScalerOptions,
}

impl Scaler {
    /// Create a scaler drawing identities from the process-wide generator.
    ///
    /// The store is narrowed to the id shape in `options`, so scale-down
    /// only ever matches names this scaler could have produced.
    pub fn new(store: ManifestStore, poller: ReadinessPoller, options: ScalerOptions) -> Self {
        Self {
            store: store.with_id_segments(&options.id_segments),
            poller,
            ids: IdGenerator::global(),
            options,
        }
    }

    /// Use a specific identifier source (deterministic in tests).
    pub fn with_id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn options(&self) -> &ScalerOptions {
        &self.options
    }

    /// Bring up `request.revisions` instances, all or nothing.
    ///
    /// Every instance runs concurrently. The result is assembled only once
    /// every task has reported. If any instance fails, every manifest of the
    /// workload is removed and the result carries no instances. Dropping
    /// the returned future aborts the tasks and rolls back the same way.
    pub async fn scale_up(&self, request: &ScaleRequest) -> ScaleResult {
        if let Err(e) = request.validate() {
            warn!(workload = %request.spec.name, error = %e, "rejected scale request");
            return ScaleResult::failed(e.into());
        }

        let workload = request.spec.name.clone();
        let revisions = request.revisions;
        let timeout = request.timeout.unwrap_or(self.options.readiness_timeout);
        let started = Instant::now();
        let deadline = deadline_after(started, timeout);

        info!(%workload, revisions, ?timeout, "scale-up starting");

        let (tx, mut rx) = mpsc::channel::<Outcome>(revisions as usize);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut guard = RollbackGuard {
            store: &self.store,
            workload: &workload,
            armed: true,
        };
        let mut tasks = JoinSet::new();

        for revision in 0..revisions {
            let tx = tx.clone();
            let cancel = cancel_rx.clone();
            let scaler = self.clone();
            let spec = request.spec.clone();

            tasks.spawn(async move {
                let identity = scaler.ids.identity(
                    &spec.name,
                    &scaler.options.id_segments,
                    &scaler.options.node_name,
                );
                let result = scaler.create_instance(&spec, &identity, deadline, cancel).await;
                // The receiver only goes away if scale_up itself was dropped.
                let _ = tx
                    .send(Outcome {
                        revision,
                        identity,
                        result,
                    })
                    .await;
            });
        }
        drop(tx);

        let mut created = Vec::new();
        let mut failures = Vec::new();
        let mut reported = HashSet::new();
        let mut cancelled = false;

        while let Some(outcome) = rx.recv().await {
            reported.insert(outcome.revision);
            match outcome.result {
                Ok(instance) => created.push((outcome.revision, instance)),
                Err(error) => {
                    if !error.is_cancelled() {
                        error!(
                            %workload,
                            revision = outcome.revision,
                            pod = %outcome.identity,
                            error = %error,
                            "instance failed"
                        );
                    }
                    failures.push(InstanceFailure {
                        revision: outcome.revision,
                        identity: Some(outcome.identity),
                        error,
                    });
                    if self.options.fail_fast && !cancelled {
                        debug!(%workload, "cancelling remaining instances");
                        cancelled = true;
                        let _ = cancel_tx.send(true);
                    }
                }
            }
        }

        // Every sender is gone; reap the tasks so none outlive the join.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                debug!(%workload, error = %e, "instance task ended abnormally");
            }
        }

        // A task that never reported ended abnormally.
        for revision in (0..revisions).filter(|r| !reported.contains(r)) {
            failures.push(InstanceFailure {
                revision,
                identity: None,
                error: InstanceError::Aborted,
            });
        }

        if failures.is_empty() {
            guard.disarm();
            created.sort_by_key(|(revision, _)| *revision);
            let created: Vec<_> = created.into_iter().map(|(_, instance)| instance).collect();
            info!(
                %workload,
                instances = created.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scale-up complete"
            );
            return ScaleResult {
                created,
                error: None,
            };
        }

        warn!(
            %workload,
            failed = failures.len(),
            succeeded = created.len(),
            "scale-up failed, rolling back"
        );
        guard.disarm();
        let rollback = match self.store.scale_down(&workload) {
            Ok(removed) => {
                info!(%workload, removed, "rollback complete");
                None
            }
            Err(e) => {
                error!(%workload, error = %e, "rollback failed, manifests may remain");
                Some(e)
            }
        };

        drop(guard);
        ScaleResult::failed(ScaleError::Creation {
            workload,
            requested: revisions,
            failures,
            rollback,
        })
    }

    /// Remove every manifest of `workload`. Safe to repeat.
    pub fn scale_down(&self, workload: &str) -> ManifestResult<usize> {
        self.store.scale_down(workload)
    }

    /// Write one manifest and wait for its pod to run.
    async fn create_instance(
        &self,
        spec: &WorkloadSpec,
        identity: &InstanceIdentity,
        deadline: Instant,
        cancel: watch::Receiver<bool>,
    ) -> Result<ReadyInstance, InstanceError> {
        let started = Instant::now();
        let record = self.store.write(spec, &identity.instance_name())?;
        let status = self
            .poller
            .await_running_or_cancel(identity, deadline, cancel)
            .await?;
        let startup = started.elapsed();

        info!(pod = %identity, startup_ms = startup.as_millis() as u64, "static pod created");
        Ok(ReadyInstance {
            identity: identity.clone(),
            manifest: record.path,
            pod_ip: status.pod_ip,
            startup,
        })
    }
}

/// `now + timeout`, clamped for timeouts too large to represent.
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

/// Roughly 30 years; effectively "no deadline".
const FAR_FUTURE_SECS: u64 = 86400 * 365 * 30;
