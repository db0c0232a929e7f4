//! `ConnectionHandle`: one bound endpoint with a bounded-retry connect
//! state machine.
//!
//! State transitions:
//! - `Unconnected` → `Connected`:   a handshake succeeds
//! - `Unconnected` → `Unconnected`: a handshake fails and retries remain
//! - `Unconnected` → `Failed`:      the retry budget is spent
//! - `Failed` → `Unconnected`:      only through [`ConnectionHandle::reset`]
//!
//! `Connected` and `Failed` are terminal otherwise: calls reuse the live
//! transport, or re-raise the recorded [`ConnectionError`] without a new
//! attempt.
//!
//! The handle never consults a `NodeList`. With several offered endpoints,
//! attempts rotate through them starting at the primary, and the whole
//! sequence shares one budget of `num_retries + 1` attempts. Failing over to
//! a candidate the handle was not given means building a new handle.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{ConfigStore, Configuration, ConnectionOptions};
use crate::error::{ConfigError, ConnectionError, TransportError};
use crate::policy::RetryPolicy;
use crate::transport::{Connector, RpcTransport};

/// RPC method used for `get_config`.
pub const GET_CONFIG_METHOD: &str = "condenser_api.get_config";

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconnected => write!(f, "unconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

enum Link {
    Unconnected,
    Connected(Arc<dyn RpcTransport>),
    Failed(ConnectionError),
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Unconnected => ConnectionState::Unconnected,
            Self::Connected(_) => ConnectionState::Connected,
            Self::Failed(_) => ConnectionState::Failed,
        }
    }
}

/// The unit every RPC-style call passes through.
pub struct ConnectionHandle {
    nodes: Vec<String>,
    options: ConnectionOptions,
    retry: RetryPolicy,
    connector: Arc<dyn Connector>,
    link: Mutex<Link>,
    /// Index into `nodes` of the endpoint currently bound.
    bound: AtomicUsize,
    attempts: AtomicU32,
    next_id: AtomicU64,
    store: Option<Arc<dyn ConfigStore>>,
}

impl ConnectionHandle {
    /// Build a handle for `nodes` (first is primary).
    ///
    /// With `options.autoconnect` the connect sequence runs here and its
    /// failure is returned. Without it, construction never touches the
    /// network and never fails; the first call connects instead.
    pub async fn new<I, S>(
        nodes: I,
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConnectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handle = Self::lazy(nodes, options, connector);
        if handle.options.autoconnect {
            handle.connect().await?;
        }
        Ok(handle)
    }

    /// Build a handle without connecting, whatever `options.autoconnect` says.
    pub fn lazy<I, S>(nodes: I, options: ConnectionOptions, connector: Arc<dyn Connector>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let retry = RetryPolicy::new(options.num_retries, options.backoff.clone());
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            options,
            retry,
            connector,
            link: Mutex::new(Link::Unconnected),
            bound: AtomicUsize::new(0),
            attempts: AtomicU32::new(0),
            next_id: AtomicU64::new(1),
            store: None,
        }
    }

    /// Build a handle from a configuration mapping.
    pub async fn from_configuration(
        config: &Configuration,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConnectionError> {
        Self::new(config.node.clone(), config.options(), connector).await
    }

    /// Build a handle from the configuration held in `store`, which the
    /// handle then owns for snapshot/restore and `set_default_nodes`.
    ///
    /// A store that cannot be read is treated as an empty configuration.
    pub async fn from_store(
        store: Arc<dyn ConfigStore>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConnectionError> {
        let config = match store.load().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "could not load configuration; using defaults");
                Configuration::default()
            }
        };
        let mut handle = Self::lazy(config.node.clone(), config.options(), connector);
        handle.store = Some(store);
        if handle.options.autoconnect {
            handle.connect().await?;
        }
        Ok(handle)
    }

    /// Attach the configuration store this handle owns.
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The endpoint currently bound: the primary until a connect succeeds
    /// elsewhere. Empty when the handle was given no endpoints.
    pub fn url(&self) -> &str {
        self.nodes
            .get(self.bound.load(Ordering::Acquire))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Every endpoint offered to this handle, primary first.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Whether write-path collaborators must skip broadcasting.
    pub fn nobroadcast(&self) -> bool {
        self.options.nobroadcast
    }

    /// Total handshakes attempted over the handle's lifetime.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn config_store(&self) -> Option<&Arc<dyn ConfigStore>> {
        self.store.as_ref()
    }

    pub async fn state(&self) -> ConnectionState {
        self.link.lock().await.state()
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Connect if not yet connected and return the live transport.
    ///
    /// A failed handle returns its recorded error without a new attempt.
    pub async fn connect(&self) -> Result<Arc<dyn RpcTransport>, ConnectionError> {
        let mut link = self.link.lock().await;
        match &*link {
            Link::Connected(transport) => return Ok(Arc::clone(transport)),
            Link::Failed(err) => return Err(err.clone()),
            Link::Unconnected => {}
        }

        match self.run_attempts().await {
            Ok(transport) => {
                *link = Link::Connected(Arc::clone(&transport));
                Ok(transport)
            }
            Err(err) => {
                *link = Link::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Return a failed (or connected) handle to `Unconnected`.
    pub async fn reset(&self) {
        let mut link = self.link.lock().await;
        *link = Link::Unconnected;
        self.bound.store(0, Ordering::Release);
    }

    async fn run_attempts(&self) -> Result<Arc<dyn RpcTransport>, ConnectionError> {
        if self.nodes.is_empty() {
            tracing::error!("no endpoints to connect to");
            return Err(ConnectionError::no_endpoints());
        }

        let mut tried: Vec<String> = Vec::new();
        let mut attempt = 0u32;
        loop {
            let idx = attempt as usize % self.nodes.len();
            let url = &self.nodes[idx];
            attempt += 1;
            self.attempts.fetch_add(1, Ordering::AcqRel);
            if !tried.contains(url) {
                tried.push(url.clone());
            }

            let err = match self.connector.connect(url).await {
                Ok(transport) => {
                    self.bound.store(idx, Ordering::Release);
                    tracing::info!(url = %url, attempt, "connected");
                    return Ok(transport);
                }
                Err(e) => e,
            };

            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        url = %url,
                        "connect failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => {
                    tracing::error!(
                        attempt,
                        error = %err,
                        url = %url,
                        "connect retries exhausted"
                    );
                    return Err(ConnectionError {
                        endpoints: tried,
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Issue an RPC call through this handle, connecting first if needed.
    pub async fn call_raw(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let transport = self.connect().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        transport.call(id, method, params).await
    }

    /// Issue an RPC call and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let value = self.call_raw(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// The node's chain configuration.
    pub async fn get_config(&self) -> Result<Value, TransportError> {
        self.call_raw(GET_CONFIG_METHOD, Vec::new()).await
    }

    /// Persist `nodes` as the default node list of the owned store.
    pub async fn set_default_nodes(&self, nodes: Vec<String>) -> Result<(), ConfigError> {
        match &self.store {
            Some(store) => store.set_default_nodes(nodes).await,
            None => Ok(()),
        }
    }

    /// Snapshot the owned configuration. Failure is logged and returned but
    /// never touches connection state.
    pub async fn refresh_backup(&self) -> Result<(), ConfigError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let result = store.refresh_backup().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "configuration snapshot failed");
        }
        result
    }

    /// Restore the owned configuration from its newest snapshot.
    pub async fn recover_with_latest_backup(&self) -> Result<(), ConfigError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let result = store.recover_with_latest_backup().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "configuration restore failed");
        }
        result
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("url", &self.url())
            .field("nodes", &self.nodes)
            .field("num_retries", &self.options.num_retries)
            .field("autoconnect", &self.options.autoconnect)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::MemoryConfigStore;
    use crate::policy::BackoffConfig;
    use crate::request::{JsonRpcRequest, JsonRpcResponse};

    struct EchoTransport(String);

    #[async_trait]
    impl RpcTransport for EchoTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Ok(JsonRpcResponse::success(
                req.id,
                json!({ "served_by": self.0, "method": req.method }),
            ))
        }
        fn url(&self) -> &str {
            &self.0
        }
    }

    /// Connects to URLs in `live`; counts attempts per URL.
    #[derive(Default)]
    struct MockConnector {
        live: Vec<&'static str>,
        calls: StdMutex<HashMap<String, u32>>,
    }

    impl MockConnector {
        fn with_live(live: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self { live, ..Default::default() })
        }

        fn attempts_for(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if self.live.iter().any(|l| *l == url) {
                Ok(Arc::new(EchoTransport(url.to_string())))
            } else {
                Err(TransportError::Http(format!("{url}: connection refused")))
            }
        }
    }

    fn opts(num_retries: u32, autoconnect: bool) -> ConnectionOptions {
        ConnectionOptions::default()
            .num_retries(num_retries)
            .autoconnect(autoconnect)
            .backoff(BackoffConfig::none())
    }

    const DEAD: &str = "https://abc.d";
    const LIVE: &str = "https://live.example";

    #[tokio::test]
    async fn autoconnect_dead_endpoint_fails_after_budget_plus_one() {
        let connector = MockConnector::with_live(vec![]);
        let err = ConnectionHandle::new([DEAD], opts(1, true), connector.clone())
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.endpoints, vec![DEAD]);
        assert_eq!(connector.attempts_for(DEAD), 2);
    }

    #[tokio::test]
    async fn zero_budget_is_one_attempt() {
        let connector = MockConnector::with_live(vec![]);
        let err = ConnectionHandle::new([DEAD], opts(0, true), connector.clone())
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(connector.attempts_for(DEAD), 1);
    }

    #[tokio::test]
    async fn lazy_construction_defers_failure_to_first_call() {
        let connector = MockConnector::with_live(vec![]);
        let handle = ConnectionHandle::new([DEAD], opts(1, false), connector.clone())
            .await
            .expect("lazy construction never fails");
        assert_eq!(connector.attempts_for(DEAD), 0);
        assert_eq!(handle.state().await, ConnectionState::Unconnected);
        assert_eq!(handle.url(), DEAD);

        let err = handle.get_config().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(handle.state().await, ConnectionState::Failed);
        assert_eq!(handle.attempts(), 2);
    }

    #[tokio::test]
    async fn failed_handle_reraises_without_new_attempts() {
        let connector = MockConnector::with_live(vec![]);
        let handle = ConnectionHandle::lazy([DEAD], opts(2, false), connector.clone());
        let first = handle.connect().await.err().unwrap();
        let second = handle.connect().await.err().unwrap();
        assert_eq!(first, second);
        assert_eq!(connector.attempts_for(DEAD), 3);

        handle.reset().await;
        assert_eq!(handle.state().await, ConnectionState::Unconnected);
        handle.connect().await.err().unwrap();
        assert_eq!(connector.attempts_for(DEAD), 6);
    }

    #[tokio::test]
    async fn connected_handle_reuses_transport() {
        let connector = MockConnector::with_live(vec![LIVE]);
        let handle = ConnectionHandle::new([LIVE], opts(3, true), connector.clone())
            .await
            .unwrap();
        assert!(handle.is_connected().await);
        let cfg = handle.get_config().await.unwrap();
        assert_eq!(cfg["served_by"], LIVE);
        assert_eq!(cfg["method"], GET_CONFIG_METHOD);
        handle.get_config().await.unwrap();
        assert_eq!(connector.attempts_for(LIVE), 1);
    }

    #[tokio::test]
    async fn list_with_live_primary_binds_primary() {
        let connector = MockConnector::with_live(vec![LIVE]);
        let handle = ConnectionHandle::new([LIVE, DEAD], opts(1, true), connector.clone())
            .await
            .unwrap();
        assert_eq!(handle.url(), LIVE);
        assert_eq!(connector.attempts_for(DEAD), 0);
    }

    #[tokio::test]
    async fn attempts_rotate_through_offered_endpoints_within_one_budget() {
        let connector = MockConnector::with_live(vec![LIVE]);
        let handle = ConnectionHandle::new([DEAD, LIVE], opts(1, true), connector.clone())
            .await
            .unwrap();
        assert_eq!(handle.url(), LIVE);
        assert_eq!(handle.attempts(), 2);

        let connector = MockConnector::with_live(vec![]);
        let err = ConnectionHandle::new([DEAD, "https://other.d"], opts(2, true), connector)
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.endpoints, vec![DEAD, "https://other.d"]);
    }

    #[tokio::test]
    async fn empty_node_list_fails_connect_with_no_attempts() {
        let connector = MockConnector::with_live(vec![]);
        let handle = ConnectionHandle::lazy(Vec::<String>::new(), opts(3, false), connector);
        assert_eq!(handle.url(), "");
        let err = handle.connect().await.err().unwrap();
        assert_eq!(err.attempts, 0);
        assert!(err.endpoints.is_empty());
    }

    #[tokio::test]
    async fn owned_store_snapshot_brackets_node_changes() {
        let store = Arc::new(MemoryConfigStore::new(Configuration {
            node: vec![LIVE.into()],
            num_retries: Some(0),
            ..Default::default()
        }));
        let connector = MockConnector::with_live(vec![LIVE]);
        let handle = ConnectionHandle::from_store(store.clone(), connector).await.unwrap();
        assert_eq!(handle.url(), LIVE);
        assert_eq!(handle.options().num_retries, 0);

        handle.refresh_backup().await.unwrap();
        handle.set_default_nodes(vec!["xyz".into()]).await.unwrap();
        assert_eq!(store.load().await.unwrap().node, vec!["xyz"]);
        handle.recover_with_latest_backup().await.unwrap();
        assert_eq!(store.load().await.unwrap().node, vec![LIVE]);
        assert!(handle.is_connected().await);
    }

    #[tokio::test]
    async fn restore_failure_leaves_connection_alone() {
        let connector = MockConnector::with_live(vec![LIVE]);
        let handle = ConnectionHandle::new([LIVE], opts(0, true), connector)
            .await
            .unwrap()
            .with_store(Arc::new(MemoryConfigStore::default()));
        assert!(handle.recover_with_latest_backup().await.is_err());
        assert!(handle.is_connected().await);
    }
}
