//! HTTP `Connector`: a handshake is one `get_config` round trip.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chainnode_core::connection::GET_CONFIG_METHOD;
use chainnode_core::error::TransportError;
use chainnode_core::probe::ConnectorProbe;
use chainnode_core::transport::{Connector, RpcTransport};

use crate::client::{HttpClientConfig, HttpRpcClient};

/// Per-attempt timeout for handshakes.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens [`HttpRpcClient`]s and proves each endpoint answers before handing
/// it out.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: HttpClientConfig,
    handshake_method: String,
}

impl HttpConnector {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            handshake_method: GET_CONFIG_METHOD.into(),
        }
    }

    /// A connector whose every request, handshake included, is bounded by
    /// `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(HttpClientConfig {
            request_timeout: timeout,
            ..HttpClientConfig::default()
        })
    }

    /// Use `method` (no params) as the handshake instead of `get_config`.
    pub fn handshake_method(mut self, method: impl Into<String>) -> Self {
        self.handshake_method = method.into();
        self
    }

    /// A health probe that routes through this connector.
    pub fn probe(self) -> ConnectorProbe {
        let timeout = self.config.request_timeout;
        ConnectorProbe::with_timeout(Arc::new(self), timeout)
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::with_timeout(CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TransportError::Http(format!("unsupported endpoint scheme: {url}")));
        }
        let client = HttpRpcClient::new(url, self.config.clone())?;
        client.call(0, &self.handshake_method, Vec::new()).await?;
        tracing::debug!(url, method = %self.handshake_method, "handshake ok");
        Ok(Arc::new(client))
    }
}
