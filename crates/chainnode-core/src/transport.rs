//! The `RpcTransport` and `Connector` traits: the seams to the wire layer.
//!
//! A [`Connector`] performs the handshake against one endpoint URL and hands
//! back a live [`RpcTransport`]. Everything above this module is transport
//! agnostic; the HTTP implementation lives in `chainnode-http`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A live channel to one node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's endpoint URL.
    fn url(&self) -> &str;

    /// Call a method and return the raw result value.
    async fn call(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }
}

/// Establishes transports to endpoint URLs.
///
/// `connect` is exactly one handshake attempt: no retries, no fallback to
/// other URLs. Retry budgets belong to `ConnectionHandle`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError>;
}
