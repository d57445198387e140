//! fleet-scheduler — scale a workload to N static pods, all or nothing.
//!
//! # Architecture
//!
//! ```text
//! Scaler::scale_up(request)
//!   ├── one task per revision
//!   │   ├── IdGenerator → InstanceIdentity
//!   │   ├── ManifestStore::write()
//!   │   └── ReadinessPoller::await_running_or_cancel()
//!   ├── outcomes → mpsc channel → join once every task has reported
//!   └── any failure → ManifestStore::scale_down(workload), no instances returned
//! ```
//!
//! All tasks share one deadline. With `fail_fast` the first failure also
//! flips a shared cancel signal so sibling pollers stop early; the join
//! still waits for every task. Dropping the `scale_up` future aborts the
//! tasks and rolls the workload back.

pub mod error;
pub mod scaler;

pub use error::{InstanceError, InstanceFailure, ScaleError};
pub use scaler::{ReadyInstance, ScaleResult, Scaler, ScalerOptions};
