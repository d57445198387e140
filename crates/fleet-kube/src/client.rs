//! `ControlPlane` backed by a `kube::Client`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::{debug, info};

use fleet_core::{ControlPlane, ControlPlaneError, PodPhase, PodStatus};

/// Reads mirror pods and creates namespaces through the API server.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect() -> Result<Self, ControlPlaneError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("failed to build client: {e}")))?;
        debug!("kubernetes client ready");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus, ControlPlaneError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = pods.get(name).await.map_err(|e| map_error("pod", name, e))?;
        Ok(status_of(&pod))
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ControlPlaneError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let object = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        match namespaces.create(&PostParams::default(), &object).await {
            Ok(_) => {
                info!(%namespace, "namespace created");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(%namespace, "namespace already exists");
                Ok(())
            }
            Err(e) => Err(map_error("namespace", namespace, e)),
        }
    }
}

/// Phase and IP of a pod object. An empty IP counts as unassigned.
fn status_of(pod: &Pod) -> PodStatus {
    let status = pod.status.as_ref();
    PodStatus {
        phase: PodPhase::parse(status.and_then(|s| s.phase.as_deref())),
        pod_ip: status
            .and_then(|s| s.pod_ip.clone())
            .filter(|ip| !ip.is_empty()),
    }
}

fn map_error(kind: &str, name: &str, err: kube::Error) -> ControlPlaneError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ControlPlaneError::not_found(kind, name),
        kube::Error::Api(ae) => ControlPlaneError::Api {
            code: ae.code,
            message: ae.message,
        },
        other => ControlPlaneError::Transport(other.to_string()),
    }
}
