//! fleet-manifest — the on-disk side of the static pod fleet.
//!
//! Each instance is one YAML pod document in the node agent's manifest
//! directory. The node agent picks files up on its own schedule; nothing
//! here assumes a file has been consumed.
//!
//! ```text
//! ManifestStore (dir)
//!   ├── write()       render → temp file → fsync → rename
//!   ├── list()        snapshot of `<workload>-<short id>.yaml`
//!   └── scale_down()  delete every listed file, missing files ignored
//! ```

pub mod error;
pub mod render;
pub mod store;

pub use error::{ManifestError, ManifestResult};
pub use render::PodManifest;
pub use store::ManifestStore;
