//! fleet-health — readiness detection and invocation for fleet instances.
//!
//! Readiness is observed only through the control plane: a manifest on
//! disk says nothing about whether the node agent has started the pod.
//!
//! # Architecture
//!
//! ```text
//! ReadinessPoller
//!   ├── ControlPlane::pod_status() by node-qualified name
//!   ├── PollTracker (not-found is transient, API errors back off)
//!   └── deadline + cancellation signal bound every wait
//!
//! Invoker
//!   ├── ControlPlane::pod_status() → pod IP
//!   └── single HTTP GET, full body read, latency measured
//! ```
//!
//! # Backoff
//!
//! `Pending` and not-found answers are polled at the base interval.
//! Control-plane errors double the interval up to the configured cap, and
//! give up after `max_consecutive_errors` in a row. A single good answer
//! resets both.

pub mod error;
pub mod invoker;
pub mod poller;

pub use error::{InvokeError, InvokeResult, ReadinessError, ReadinessResult};
pub use invoker::Invoker;
pub use poller::{PollDecision, PollTracker, ReadinessPolicy, ReadinessPoller};
