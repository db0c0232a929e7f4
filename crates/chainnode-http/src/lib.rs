//! chainnode-http: HTTP transport and the process-wide shared instance.
//!
//! # Quick start
//! ```rust,no_run
//! use chainnode_core::{ChainVariant, ConnectionOptions, NodeList};
//! use chainnode_http::{connect, set_shared_instance, HttpConnector};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut nodes = NodeList::new();
//! nodes.update_nodes(&HttpConnector::default().probe()).await;
//!
//! let handle = connect(nodes.get_nodes(ChainVariant::Hive), ConnectionOptions::default()).await?;
//! set_shared_instance(Some(Arc::new(handle)));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connector;
pub mod shared;

pub use client::{HttpClientConfig, HttpRpcClient};
pub use connector::HttpConnector;
pub use shared::{connect, global, set_shared_config, set_shared_instance, shared_instance};
