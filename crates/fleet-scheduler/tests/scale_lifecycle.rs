//! End-to-end scale-up / rollback / scale-down against a scripted control
//! plane and a temporary manifest directory.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use fleet_core::{ControlPlane, ControlPlaneError, IdGenerator, PodPhase, PodStatus, ScaleRequest, WorkloadSpec};
use fleet_health::{ReadinessError, ReadinessPoller, ReadinessPolicy};
use fleet_manifest::ManifestStore;
use fleet_scheduler::{InstanceError, ScaleError, Scaler, ScalerOptions};

const POLL: Duration = Duration::from_millis(50);

/// Simulated node: each pod is unregistered for one poll, pending for one,
/// then running. The `fail_nth` distinct pod seen (1-based) fails instead,
/// and `stuck` keeps every pod pending forever.
#[derive(Default)]
struct FakeNode {
    seen: Mutex<Vec<String>>,
    polls: Mutex<Vec<String>>,
    fail_nth: Option<usize>,
    stuck: bool,
}

impl FakeNode {
    fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing_nth(n: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_nth: Some(n),
            ..Self::default()
        })
    }

    fn stuck() -> Arc<Self> {
        Arc::new(Self {
            stuck: true,
            ..Self::default()
        })
    }

    fn distinct_pods(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ControlPlane for FakeNode {
    async fn pod_status(&self, _namespace: &str, name: &str) -> Result<PodStatus, ControlPlaneError> {
        let ordinal = {
            let mut seen = self.seen.lock().unwrap();
            match seen.iter().position(|n| n == name) {
                Some(i) => i + 1,
                None => {
                    seen.push(name.to_string());
                    seen.len()
                }
            }
        };
        let polls = {
            let mut polls = self.polls.lock().unwrap();
            polls.push(name.to_string());
            polls.iter().filter(|n| *n == name).count()
        };

        if self.fail_nth == Some(ordinal) {
            return Ok(PodStatus::new(PodPhase::Failed));
        }
        match polls {
            1 => Err(ControlPlaneError::not_found("pod", name)),
            2 => Ok(PodStatus::new(PodPhase::Pending)),
            _ if self.stuck => Ok(PodStatus::new(PodPhase::Pending)),
            _ => Ok(PodStatus::new(PodPhase::Running).with_ip(&format!("10.0.0.{ordinal}"))),
        }
    }

    async fn ensure_namespace(&self, _namespace: &str) -> Result<(), ControlPlaneError> {
        Ok(())
    }
}

fn scaler(dir: &Path, node: Arc<FakeNode>, fail_fast: bool) -> Scaler {
    let poller = ReadinessPoller::new(node, "default", ReadinessPolicy::fixed(POLL, 3));
    let mut options = ScalerOptions::new("worker-1");
    options.readiness_timeout = Duration::from_secs(30);
    options.fail_fast = fail_fast;
    Scaler::new(ManifestStore::new(dir), poller, options)
}

fn request(name: &str, revisions: u32) -> ScaleRequest {
    ScaleRequest::new(WorkloadSpec::new(name, "crccheck/hello-world", "latest", 8000), revisions)
}

fn manifests(dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(prefix))
        .collect();
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn scale_up_creates_every_revision() {
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::healthy();
    let scaler = scaler(dir.path(), node.clone(), false);

    let result = scaler.scale_up(&request("fn", 5)).await;

    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.created.len(), 5);

    let names: HashSet<_> = result
        .identities()
        .iter()
        .map(|id| id.node_qualified_name.clone())
        .collect();
    assert_eq!(names.len(), 5);
    assert!(names.iter().all(|n| n.starts_with("fn-") && n.ends_with("-worker-1")));

    assert_eq!(manifests(dir.path(), "fn").len(), 5);
    assert_eq!(node.distinct_pods(), 5);

    for instance in &result.created {
        // not-found, pending, running
        assert_eq!(instance.startup, POLL * 2);
        assert!(instance.pod_ip.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn one_failure_rolls_back_everything() {
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::failing_nth(3);
    let scaler = scaler(dir.path(), node.clone(), false);

    let result = scaler.scale_up(&request("fn", 5)).await;

    assert!(result.created.is_empty());
    let err = result.error.expect("scale-up should fail");
    match &err {
        ScaleError::Creation {
            workload,
            requested,
            failures,
            rollback,
        } => {
            assert_eq!(workload, "fn");
            assert_eq!(*requested, 5);
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                failures[0].error,
                InstanceError::Readiness(ReadinessError::PodFailed { .. })
            ));
            assert!(rollback.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("1 of 5"));

    // Every sibling was written and polled, then removed.
    assert_eq!(node.distinct_pods(), 5);
    assert!(manifests(dir.path(), "fn").is_empty());
}

#[tokio::test(start_paused = true)]
async fn rollback_leaves_other_workloads_alone() {
    let dir = tempfile::tempdir().unwrap();
    let healthy = scaler(dir.path(), FakeNode::healthy(), false);
    healthy.scale_up(&request("api", 2)).await.into_result().unwrap();

    let failing = scaler(dir.path(), FakeNode::failing_nth(1), false);
    let result = failing.scale_up(&request("fn", 3)).await;

    assert!(result.error.is_some());
    assert!(manifests(dir.path(), "fn-").is_empty());
    assert_eq!(manifests(dir.path(), "api-").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rollback_spares_workloads_sharing_a_name_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let healthy = scaler(dir.path(), FakeNode::healthy(), false);
    healthy.scale_up(&request("fn-api", 2)).await.into_result().unwrap();
    assert_eq!(manifests(dir.path(), "fn-api-").len(), 2);

    let failing = scaler(dir.path(), FakeNode::failing_nth(1), false);
    let result = failing.scale_up(&request("fn", 1)).await;

    assert!(result.error.is_some());
    assert_eq!(manifests(dir.path(), "fn-api-").len(), 2);
    assert_eq!(manifests(dir.path(), "fn-").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_scale_up_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::stuck();
    let scaler = scaler(dir.path(), node.clone(), false);

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        scaler.scale_up(&request("fn", 3).with_timeout(Duration::from_secs(60))),
    )
    .await;

    assert!(outcome.is_err(), "scale-up should still be waiting");
    assert_eq!(node.distinct_pods(), 3);
    assert!(manifests(dir.path(), "fn").is_empty());

    // Aborted pollers never come back to write or poll again.
    let polls = node.polls.lock().unwrap().len();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(manifests(dir.path(), "fn").is_empty());
    assert_eq!(node.polls.lock().unwrap().len(), polls);
}

#[tokio::test(start_paused = true)]
async fn stuck_pods_time_out_together() {
    let dir = tempfile::tempdir().unwrap();
    let scaler = scaler(dir.path(), FakeNode::stuck(), false);

    let timeout = Duration::from_secs(2);
    let start = Instant::now();
    let result = scaler.scale_up(&request("fn", 3).with_timeout(timeout)).await;
    let elapsed = start.elapsed();

    assert!(elapsed >= timeout);
    assert!(elapsed <= timeout + POLL);

    match result.error {
        Some(ScaleError::Creation { failures, .. }) => {
            assert_eq!(failures.len(), 3);
            assert!(failures.iter().all(|f| matches!(
                f.error,
                InstanceError::Readiness(ReadinessError::Timeout {
                    last_phase: PodPhase::Pending,
                    ..
                })
            )));
        }
        other => panic!("expected creation failure, got {other:?}"),
    }
    assert!(manifests(dir.path(), "fn").is_empty());
}

#[tokio::test(start_paused = true)]
async fn fail_fast_cancels_pending_siblings() {
    let dir = tempfile::tempdir().unwrap();
    // The first pod fails; every other pod would stay pending until the deadline.
    let node = Arc::new(FakeNode {
        fail_nth: Some(1),
        stuck: true,
        ..FakeNode::default()
    });
    let scaler = scaler(dir.path(), node, true);

    let start = Instant::now();
    let result = scaler
        .scale_up(&request("fn", 4).with_timeout(Duration::from_secs(60)))
        .await;

    assert!(start.elapsed() < Duration::from_secs(1));
    let err = result.error.expect("scale-up should fail");
    let root = err.root_cause().unwrap();
    assert!(matches!(
        root.error,
        InstanceError::Readiness(ReadinessError::PodFailed { .. })
    ));
    match &err {
        ScaleError::Creation { failures, .. } => {
            assert_eq!(failures.len(), 4);
            assert_eq!(failures.iter().filter(|f| f.error.is_cancelled()).count(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(manifests(dir.path(), "fn").is_empty());
}

#[tokio::test(start_paused = true)]
async fn unwritable_directory_fails_every_instance() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-there");
    let node = FakeNode::healthy();
    let scaler = scaler(&missing, node.clone(), false);

    let result = scaler.scale_up(&request("fn", 3)).await;

    match result.error {
        Some(ScaleError::Creation {
            failures, rollback, ..
        }) => {
            assert_eq!(failures.len(), 3);
            assert!(failures
                .iter()
                .all(|f| matches!(f.error, InstanceError::Manifest(_))));
            assert!(rollback.is_none());
        }
        other => panic!("expected creation failure, got {other:?}"),
    }
    // Nothing was written, so nothing was polled.
    assert_eq!(node.distinct_pods(), 0);
}

#[tokio::test(start_paused = true)]
async fn scale_down_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let scaler = scaler(dir.path(), FakeNode::healthy(), false);
    scaler.scale_up(&request("fn", 3)).await.into_result().unwrap();

    assert_eq!(scaler.scale_down("fn").unwrap(), 3);
    assert_eq!(scaler.scale_down("fn").unwrap(), 0);
    assert!(manifests(dir.path(), "fn").is_empty());
}

#[tokio::test(start_paused = true)]
async fn seeded_generator_gives_reproducible_names() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let a = scaler(first.path(), FakeNode::healthy(), false)
        .with_id_generator(Arc::new(IdGenerator::seeded(99)));
    let b = scaler(second.path(), FakeNode::healthy(), false)
        .with_id_generator(Arc::new(IdGenerator::seeded(99)));

    a.scale_up(&request("fn", 1)).await.into_result().unwrap();
    b.scale_up(&request("fn", 1)).await.into_result().unwrap();

    assert_eq!(manifests(first.path(), "fn"), manifests(second.path(), "fn"));
}
