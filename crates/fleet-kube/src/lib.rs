//! fleet-kube — the control plane as seen through the Kubernetes API.
//!
//! Static pods show up in the API server as mirror pods named
//! `<metadata.name>-<node>`; this crate only reads them and, optionally,
//! creates the namespace they are queried in. Credentials come from the
//! usual kubeconfig / in-cluster discovery done by `kube::Client`.

pub mod client;

pub use client::KubeControlPlane;
