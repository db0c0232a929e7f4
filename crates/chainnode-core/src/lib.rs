//! chainnode-core: endpoint selection and connection lifecycle for
//! Steem-family RPC clients.
//!
//! # Overview
//!
//! Application code addresses chain objects (accounts, blocks, comments,
//! wallets, …) without picking an RPC node by hand. This crate provides:
//!
//! - [`NodeList`]: candidate endpoints per chain variant, reordered by
//!   [`HealthProbe`] results (reachable and fastest first)
//! - [`ConnectionHandle`]: one bound endpoint with a lazy/eager connect state
//!   machine and a bounded retry budget
//! - [`InstanceRegistry`]: the shared default connection and configuration
//!   every object falls back to when it is not given a connection
//! - [`RpcTransport`] / [`Connector`]: the seams to the wire layer
//! - [`config`]: configuration mapping plus a store with snapshot/restore
//! - [`objects`]: thin chain-object wrappers bound through the registry

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod nodelist;
pub mod objects;
pub mod policy;
pub mod probe;
pub mod registry;
pub mod request;
pub mod transport;

pub use config::{ConfigStore, Configuration, ConnectionOptions, FileConfigStore, MemoryConfigStore};
pub use connection::{ConnectionHandle, ConnectionState};
pub use endpoint::{ChainVariant, Endpoint};
pub use error::{ConfigError, ConnectionError, TransportError};
pub use nodelist::{NodeFilter, NodeList};
pub use objects::Bound;
pub use policy::{BackoffConfig, RetryPolicy};
pub use probe::{ConnectorProbe, HealthProbe, ProbeResult};
pub use registry::InstanceRegistry;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{Connector, RpcTransport};
