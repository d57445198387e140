//! Function invocation over plain HTTP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use tracing::{debug, info};

use fleet_core::{ControlPlane, InstanceIdentity, InvocationResult};

use crate::error::{InvokeError, InvokeResult};

/// Calls functions running in fleet pods.
#[derive(Clone)]
pub struct Invoker {
    control_plane: Arc<dyn ControlPlane>,
    timeout: Duration,
}

impl Invoker {
    pub fn new(control_plane: Arc<dyn ControlPlane>, timeout: Duration) -> Self {
        Self {
            control_plane,
            timeout,
        }
    }

    /// Resolve the pod's address and issue one `GET /` to it. No retries.
    pub async fn invoke(
        &self,
        identity: &InstanceIdentity,
        namespace: &str,
        port: u16,
    ) -> InvokeResult<InvocationResult> {
        let ip = self.resolve_address(identity, namespace).await?;
        let result = self.call(&host_port(&ip, port)).await?;
        info!(
            pod = %identity,
            status = result.status_code,
            latency_ms = result.latency.as_millis() as u64,
            "function invoked"
        );
        Ok(result)
    }

    /// The pod IP currently assigned to `identity`.
    pub async fn resolve_address(&self, identity: &InstanceIdentity, namespace: &str) -> InvokeResult<String> {
        let name = &identity.node_qualified_name;
        let status = self
            .control_plane
            .pod_status(namespace, name)
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    InvokeError::AddressUnavailable { name: name.clone() }
                } else {
                    InvokeError::ControlPlane {
                        name: name.clone(),
                        source,
                    }
                }
            })?;

        status
            .pod_ip
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| InvokeError::AddressUnavailable { name: name.clone() })
    }

    /// `GET http://{address}/` and read the whole body.
    ///
    /// Latency covers connect through the last body byte.
    pub async fn call(&self, address: &str) -> InvokeResult<InvocationResult> {
        let uri = format!("http://{address}/");
        let failed = |reason: String| InvokeError::Invocation {
            uri: uri.clone(),
            reason,
        };

        let started = Instant::now();
        let exchange = async {
            let stream = tokio::net::TcpStream::connect(address)
                .await
                .map_err(|e| failed(format!("connect: {e}")))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| failed(format!("handshake: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "invocation connection closed with error");
                }
            });

            let req = http::Request::builder()
                .method(http::Method::GET)
                .uri("/")
                .header(http::header::HOST, address)
                .body(Empty::<Bytes>::new())
                .map_err(|e| failed(format!("request: {e}")))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| failed(format!("send: {e}")))?;
            let status_code = resp.status().as_u16();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| failed(format!("body: {e}")))?
                .to_bytes();

            Ok::<_, InvokeError>((status_code, body))
        };

        let (status_code, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| failed(format!("timed out after {:?}", self.timeout)))??;

        let latency = started.elapsed();
        debug!(%uri, status_code, bytes = body.len(), ?latency, "function responded");

        Ok(InvocationResult {
            status_code,
            body: body.to_vec(),
            latency,
        })
    }
}

/// `ip:port`, bracketing IPv6 literals.
fn host_port(ip: &str, port: u16) -> String {
    if ip.contains(':') {
        format!("[{ip}]:{port}")
    } else {
        format!("{ip}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use fleet_core::{ControlPlaneError, PodPhase, PodStatus};

    use super::*;

    struct FixedStatus(Result<PodStatus, ControlPlaneError>);

    #[async_trait]
    impl ControlPlane for FixedStatus {
        async fn pod_status(&self, _namespace: &str, _name: &str) -> Result<PodStatus, ControlPlaneError> {
            self.0.clone()
        }

        async fn ensure_namespace(&self, _namespace: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }
    }

    fn invoker(status: Result<PodStatus, ControlPlaneError>) -> Invoker {
        Invoker::new(Arc::new(FixedStatus(status)), Duration::from_secs(2))
    }

    fn identity() -> InstanceIdentity {
        InstanceIdentity::new("fn", "abc-de", "node")
    }

    /// Serve one canned HTTP response, returning the bound port.
    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn invoke_reads_full_body() {
        let port = serve_once("HTTP/1.1 200 OK\r\ncontent-length: 11\r\nconnection: close\r\n\r\nhello world").await;
        let invoker = invoker(Ok(PodStatus::new(PodPhase::Running).with_ip("127.0.0.1")));

        let result = invoker.invoke(&identity(), "default", port).await.unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body_text(), "hello world");
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let port = serve_once("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 4\r\nconnection: close\r\n\r\nbusy").await;
        let invoker = invoker(Ok(PodStatus::new(PodPhase::Running).with_ip("127.0.0.1")));

        let result = invoker.invoke(&identity(), "default", port).await.unwrap();
        assert_eq!(result.status_code, 503);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn missing_ip_is_address_unavailable() {
        let invoker = invoker(Ok(PodStatus::new(PodPhase::Pending)));
        let err = invoker.invoke(&identity(), "default", 8000).await.unwrap_err();
        assert!(matches!(err, InvokeError::AddressUnavailable { .. }));
    }

    #[tokio::test]
    async fn unregistered_pod_is_address_unavailable() {
        let invoker = invoker(Err(ControlPlaneError::not_found("pod", "fn")));
        let err = invoker.invoke(&identity(), "default", 8000).await.unwrap_err();
        assert!(matches!(err, InvokeError::AddressUnavailable { .. }));
    }

    #[tokio::test]
    async fn control_plane_failure_is_surfaced() {
        let invoker = invoker(Err(ControlPlaneError::Transport("connection refused".into())));
        let err = invoker.invoke(&identity(), "default", 8000).await.unwrap_err();
        assert!(matches!(err, InvokeError::ControlPlane { .. }));
    }

    #[tokio::test]
    async fn closed_port_is_invocation_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let invoker = invoker(Ok(PodStatus::new(PodPhase::Running).with_ip("127.0.0.1")));
        let err = invoker.invoke(&identity(), "default", port).await.unwrap_err();
        assert!(matches!(err, InvokeError::Invocation { .. }));
    }

    #[test]
    fn ipv6_addresses_are_bracketed() {
        assert_eq!(host_port("10.0.0.1", 80), "10.0.0.1:80");
        assert_eq!(host_port("fd00::1", 8000), "[fd00::1]:8000");
    }
}
