//! fleet-core — shared building blocks for the static pod fleet.
//!
//! - [`types`]: workload, identity, and result records
//! - [`ident`]: process-wide random identifier generator
//! - [`config`]: `fleet.toml` parsing and duration strings
//! - [`control_plane`]: the narrow API used to observe pods

pub mod config;
pub mod control_plane;
pub mod error;
pub mod ident;
pub mod types;

pub use config::FleetConfig;
pub use control_plane::{ControlPlane, PodPhase, PodStatus};
pub use error::{ConfigError, ControlPlaneError, ValidationError};
pub use ident::IdGenerator;
pub use types::*;
