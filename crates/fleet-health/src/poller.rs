//! Readiness polling against the control plane.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use fleet_core::config::ReadinessConfig;
use fleet_core::{ConfigError, ControlPlane, ControlPlaneError, InstanceIdentity, PodPhase, PodStatus};

use crate::error::{ReadinessError, ReadinessResult};

/// Poll cadence and error bound for readiness waits.
#[derive(Debug, Clone)]
pub struct ReadinessPolicy {
    /// Interval between polls while the pod is pending or unregistered.
    pub poll_interval: Duration,
    /// Cap for the backoff applied after control-plane errors.
    pub max_poll_interval: Duration,
    /// Consecutive control-plane errors tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_interval: Duration::from_secs(5),
            max_consecutive_errors: 5,
        }
    }
}

impl ReadinessPolicy {
    pub fn from_config(config: &ReadinessConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            poll_interval: config.poll_interval()?,
            max_poll_interval: config.max_poll_interval()?,
            max_consecutive_errors: config.max_consecutive_errors.max(1),
        })
    }

    /// Fixed-interval policy.
    pub fn fixed(interval: Duration, max_consecutive_errors: u32) -> Self {
        Self {
            poll_interval: interval,
            max_poll_interval: interval,
            max_consecutive_errors,
        }
    }
}

/// What to do after one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// The pod is running.
    Ready,
    /// Poll again after the given interval.
    Retry(Duration),
    /// The pod reached a phase it will never leave.
    Terminal(PodPhase),
    /// Too many consecutive control-plane errors.
    GiveUp,
}

/// Tracks consecutive poll results for a single instance.
#[derive(Debug)]
pub struct PollTracker {
    /// Last phase observed; `Unknown` until the pod is registered.
    last_phase: PodPhase,
    polls: u32,
    consecutive_errors: u32,
    max_consecutive_errors: u32,
    current_interval: Duration,
    base_interval: Duration,
    max_interval: Duration,
}

impl PollTracker {
    pub fn new(policy: &ReadinessPolicy) -> Self {
        Self {
            last_phase: PodPhase::Unknown,
            polls: 0,
            consecutive_errors: 0,
            max_consecutive_errors: policy.max_consecutive_errors,
            current_interval: policy.poll_interval,
            base_interval: policy.poll_interval,
            max_interval: policy.max_poll_interval.max(policy.poll_interval),
        }
    }

    /// Record one control-plane answer and decide the next step.
    pub fn record(&mut self, observed: &Result<PodStatus, ControlPlaneError>) -> PollDecision {
        self.polls += 1;
        match observed {
            Ok(status) => {
                self.reset_errors();
                self.last_phase = status.phase;
                match status.phase {
                    PodPhase::Running => PollDecision::Ready,
                    phase if phase.is_terminal() => PollDecision::Terminal(phase),
                    _ => PollDecision::Retry(self.current_interval),
                }
            }
            // The node agent registers the pod some time after picking up the manifest.
            Err(e) if e.is_not_found() => {
                self.reset_errors();
                self.last_phase = PodPhase::Unknown;
                PollDecision::Retry(self.current_interval)
            }
            Err(e) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.max_consecutive_errors {
                    warn!(
                        errors = self.consecutive_errors,
                        error = %e,
                        "control plane error bound reached"
                    );
                    return PollDecision::GiveUp;
                }
                self.current_interval = self.current_interval.saturating_mul(2).min(self.max_interval);
                debug!(errors = self.consecutive_errors, error = %e, backoff = ?self.current_interval, "control plane error, backing off");
                PollDecision::Retry(self.current_interval)
            }
        }
    }

    pub fn last_phase(&self) -> PodPhase {
        self.last_phase
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Current interval before the next poll.
    pub fn next_interval(&self) -> Duration {
        self.current_interval
    }

    fn reset_errors(&mut self) {
        self.consecutive_errors = 0;
        self.current_interval = self.base_interval;
    }
}

/// Waits for instances to reach `Running`.
#[derive(Clone)]
pub struct ReadinessPoller {
    control_plane: Arc<dyn ControlPlane>,
    namespace: String,
    policy: ReadinessPolicy,
}

impl ReadinessPoller {
    pub fn new(control_plane: Arc<dyn ControlPlane>, namespace: &str, policy: ReadinessPolicy) -> Self {
        Self {
            control_plane,
            namespace: namespace.to_string(),
            policy,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn policy(&self) -> &ReadinessPolicy {
        &self.policy
    }

    /// Block until `identity` is running or `deadline` passes.
    pub async fn await_running(
        &self,
        identity: &InstanceIdentity,
        deadline: Instant,
    ) -> ReadinessResult<PodStatus> {
        let (_keep, cancel) = watch::channel(false);
        self.await_running_or_cancel(identity, deadline, cancel).await
    }

    /// Like [`await_running`](Self::await_running), but also returns
    /// `Cancelled` once `cancel` flips to `true`.
    ///
    /// Never waits past `deadline` by more than one in-flight query.
    pub async fn await_running_or_cancel(
        &self,
        identity: &InstanceIdentity,
        deadline: Instant,
        mut cancel: watch::Receiver<bool>,
    ) -> ReadinessResult<PodStatus> {
        let name = identity.node_qualified_name.as_str();
        let started = Instant::now();
        let mut tracker = PollTracker::new(&self.policy);

        let timeout = |tracker: &PollTracker| ReadinessError::Timeout {
            name: name.to_string(),
            waited: started.elapsed(),
            last_phase: tracker.last_phase(),
        };
        let cancelled = || ReadinessError::Cancelled {
            name: name.to_string(),
        };

        loop {
            let observed = tokio::select! {
                biased;
                _ = cancellation(&mut cancel) => return Err(cancelled()),
                _ = sleep_until(deadline) => return Err(timeout(&tracker)),
                observed = self.control_plane.pod_status(&self.namespace, name) => observed,
            };

            match tracker.record(&observed) {
                PollDecision::Ready => {
                    info!(pod = %name, polls = tracker.polls(), elapsed_ms = started.elapsed().as_millis() as u64, "pod running");
                    // Ready implies Ok.
                    return observed.map_err(|source| ReadinessError::ControlPlane {
                        name: name.to_string(),
                        attempts: tracker.consecutive_errors(),
                        source,
                    });
                }
                PollDecision::Terminal(phase) => {
                    warn!(pod = %name, %phase, "pod will never run");
                    return Err(ReadinessError::PodFailed {
                        name: name.to_string(),
                        phase,
                    });
                }
                PollDecision::GiveUp => {
                    let source = observed.err().unwrap_or_else(|| {
                        ControlPlaneError::Transport("error bound reached".to_string())
                    });
                    return Err(ReadinessError::ControlPlane {
                        name: name.to_string(),
                        attempts: tracker.consecutive_errors(),
                        source,
                    });
                }
                PollDecision::Retry(interval) => {
                    debug!(pod = %name, phase = %tracker.last_phase(), ?interval, "pod not running yet");
                    let wake = Instant::now().checked_add(interval).unwrap_or(deadline);
                    tokio::select! {
                        biased;
                        _ = cancellation(&mut cancel) => return Err(cancelled()),
                        _ = sleep_until(wake.min(deadline)) => {
                            if wake >= deadline {
                                return Err(timeout(&tracker));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Resolves once the cancel flag is set. A dropped sender never cancels.
async fn cancellation(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
