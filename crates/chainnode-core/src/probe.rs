//! Endpoint health probe: one lightweight round trip per candidate.
//!
//! Unreachability is data, not a fault: [`HealthProbe::probe`] never
//! returns an error, and it never retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::transport::Connector;

/// Fixed per-probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of probing one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency: Duration,
}

impl ProbeResult {
    pub fn reachable(latency: Duration) -> Self {
        Self { reachable: true, latency }
    }

    pub fn unreachable(latency: Duration) -> Self {
        Self { reachable: false, latency }
    }
}

/// Classifies an endpoint as reachable/unreachable and measures latency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeResult;
}

/// Probes by performing a single handshake through a [`Connector`].
#[derive(Clone)]
pub struct ConnectorProbe {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl ConnectorProbe {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_timeout(connector, PROBE_TIMEOUT)
    }

    pub fn with_timeout(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }
}

#[async_trait]
impl HealthProbe for ConnectorProbe {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.connector.connect(&endpoint.url)).await;
        let latency = start.elapsed();

        let result = match outcome {
            Ok(Ok(_)) => ProbeResult::reachable(latency),
            Ok(Err(e)) => {
                tracing::debug!(url = %endpoint.url, error = %e, "probe failed");
                ProbeResult::unreachable(latency)
            }
            Err(_) => {
                tracing::debug!(url = %endpoint.url, timeout_ms = self.timeout.as_millis(), "probe timed out");
                ProbeResult::unreachable(latency)
            }
        };
        tracing::debug!(
            url = %endpoint.url,
            reachable = result.reachable,
            latency_ms = latency.as_millis(),
            "probed endpoint"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ChainVariant;
    use crate::error::TransportError;
    use crate::request::{JsonRpcRequest, JsonRpcResponse};
    use crate::transport::RpcTransport;

    struct NullTransport(String);

    #[async_trait]
    impl RpcTransport for NullTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Ok(JsonRpcResponse::success(req.id, serde_json::Value::Null))
        }
        fn url(&self) -> &str {
            &self.0
        }
    }

    struct StubConnector {
        live: &'static str,
        stall: Option<Duration>,
    }

    #[async_trait]
    impl Connector for StubConnector {
        async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            if url == self.live {
                Ok(Arc::new(NullTransport(url.to_string())))
            } else {
                Err(TransportError::Http("connection refused".into()))
            }
        }
    }

    fn probe(stall: Option<Duration>, timeout: Duration) -> ConnectorProbe {
        ConnectorProbe::with_timeout(
            Arc::new(StubConnector { live: "https://live.example", stall }),
            timeout,
        )
    }

    #[tokio::test]
    async fn live_endpoint_is_reachable() {
        let p = probe(None, PROBE_TIMEOUT);
        let r = p.probe(&Endpoint::new("https://live.example", ChainVariant::Hive)).await;
        assert!(r.reachable);
    }

    #[tokio::test]
    async fn refused_endpoint_is_reported_not_raised() {
        let p = probe(None, PROBE_TIMEOUT);
        let r = p.probe(&Endpoint::new("https://dead.example", ChainVariant::Hive)).await;
        assert!(!r.reachable);
    }

    #[tokio::test]
    async fn stalled_endpoint_times_out_as_unreachable() {
        let p = probe(Some(Duration::from_secs(10)), Duration::from_millis(20));
        let r = p.probe(&Endpoint::new("https://live.example", ChainVariant::Hive)).await;
        assert!(!r.reachable);
        assert!(r.latency < Duration::from_secs(10));
    }
}
