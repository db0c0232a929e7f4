//! Connection, transport and configuration error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// A connect attempt sequence exhausted its retry budget.
///
/// Carries every endpoint that was tried (in the order first tried) and the
/// number of handshakes made. Always recoverable by the caller: try another
/// endpoint, raise the budget, or accept the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not connect to [{}] after {attempts} attempt(s): {reason}", .endpoints.join(", "))]
pub struct ConnectionError {
    /// Endpoints tried, deduplicated, in order of first attempt.
    pub endpoints: Vec<String>,
    /// Total handshakes made before giving up.
    pub attempts: u32,
    /// The last underlying failure.
    pub reason: String,
}

impl ConnectionError {
    /// The handle was offered no endpoint at all.
    pub fn no_endpoints() -> Self {
        Self {
            endpoints: Vec::new(),
            attempts: 0,
            reason: "no endpoints available".into(),
        }
    }
}

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The bound connection could not be established.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// HTTP request failed (connection refused, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The node answered but the requested object does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and a handshake may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// Returns `true` if the call failed because no connection could be made.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Errors raised by a configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no configuration backup available")]
    NoBackup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_lists_endpoints_and_attempts() {
        let err = ConnectionError {
            endpoints: vec!["https://a.example".into(), "https://b.example".into()],
            attempts: 3,
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://a.example, https://b.example"));
        assert!(msg.contains("3 attempt(s)"));
    }

    #[test]
    fn connection_error_lifts_into_transport_error() {
        let err: TransportError = ConnectionError::no_endpoints().into();
        assert!(err.is_connection_error());
        assert!(!err.is_retryable());
    }
}
