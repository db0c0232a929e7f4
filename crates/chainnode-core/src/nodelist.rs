//! Ordered candidate endpoints with health-aware refresh.
//!
//! Ordering invariant after [`NodeList::update_nodes`]: every reachable
//! endpoint precedes every unreachable one; reachable endpoints are sorted by
//! ascending latency, unreachable ones keep their previous relative order.
//! A refresh never removes a candidate.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;

use crate::connection::ConnectionHandle;
use crate::endpoint::{seed_endpoints, ChainVariant, Endpoint};
use crate::probe::{ConnectorProbe, HealthProbe, ProbeResult};

/// Restricts which candidates [`NodeList::get_nodes_with`] returns.
#[derive(Debug, Clone)]
pub struct NodeFilter {
    pub variant: ChainVariant,
    pub https: bool,
    pub wss: bool,
    /// Drop endpoints whose last probe failed. Unprobed endpoints are kept.
    pub exclude_unreachable: bool,
}

impl NodeFilter {
    pub fn new(variant: ChainVariant) -> Self {
        Self {
            variant,
            https: true,
            wss: true,
            exclude_unreachable: false,
        }
    }

    pub fn https_only(mut self) -> Self {
        self.wss = false;
        self
    }

    pub fn wss_only(mut self) -> Self {
        self.https = false;
        self
    }

    pub fn exclude_unreachable(mut self) -> Self {
        self.exclude_unreachable = true;
        self
    }
}

/// Candidate endpoints, most preferred first.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    endpoints: Vec<Endpoint>,
    health: HashMap<String, ProbeResult>,
    refreshed: bool,
}

impl NodeList {
    /// The built-in public seed list, unprobed.
    pub fn new() -> Self {
        Self::from_endpoints(seed_endpoints())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            health: HashMap::new(),
            refreshed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// `true` once `update_nodes` has run at least once.
    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    /// All candidates in current order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Last probe result for `url`, if it has been probed.
    pub fn health(&self, url: &str) -> Option<ProbeResult> {
        self.health.get(url).copied()
    }

    /// URLs serving `variant`, in current order. May be empty.
    pub fn get_nodes(&self, variant: ChainVariant) -> Vec<String> {
        self.get_nodes_with(&NodeFilter::new(variant))
    }

    pub fn get_nodes_with(&self, filter: &NodeFilter) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|e| e.variant == filter.variant)
            .filter(|e| (filter.https && e.is_http()) || (filter.wss && e.is_websocket()))
            .filter(|e| {
                !filter.exclude_unreachable
                    || self.health.get(&e.url).map_or(true, |h| h.reachable)
            })
            .map(|e| e.url.clone())
            .collect()
    }

    /// Probe every candidate and reorder.
    pub async fn update_nodes(&mut self, probe: &dyn HealthProbe) {
        let results = join_all(self.endpoints.iter().map(|e| probe.probe(e))).await;

        let mut probed: Vec<(Endpoint, ProbeResult)> =
            self.endpoints.drain(..).zip(results).collect();
        // Stable: ties and the unreachable tail keep their previous order.
        probed.sort_by_key(|(_, r)| {
            let latency = if r.reachable { r.latency } else { Duration::ZERO };
            (!r.reachable, latency)
        });

        self.health.clear();
        for (endpoint, result) in probed {
            self.health.insert(endpoint.url.clone(), result);
            self.endpoints.push(endpoint);
        }
        self.refreshed = true;

        tracing::debug!(
            candidates = self.endpoints.len(),
            reachable = self.health.values().filter(|h| h.reachable).count(),
            "node list refreshed"
        );
    }

    /// Probe every candidate through `handle`'s connector and reorder.
    pub async fn update_nodes_via(&mut self, handle: &ConnectionHandle) {
        let probe = ConnectorProbe::new(handle.connector());
        self.update_nodes(&probe).await;
    }
}
