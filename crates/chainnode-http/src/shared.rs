//! Process-wide shared instance over HTTP.
//!
//! Thin free functions over one lazily built [`InstanceRegistry`] that
//! connects through [`HttpConnector`]. Code that wants isolation (tests,
//! embedding several sessions) should build its own registry instead.

use std::sync::{Arc, OnceLock};

use chainnode_core::config::{Configuration, ConnectionOptions};
use chainnode_core::connection::ConnectionHandle;
use chainnode_core::error::ConnectionError;
use chainnode_core::registry::InstanceRegistry;

use crate::connector::HttpConnector;

static GLOBAL: OnceLock<InstanceRegistry> = OnceLock::new();

/// The process-wide registry.
pub fn global() -> &'static InstanceRegistry {
    GLOBAL.get_or_init(|| InstanceRegistry::new(Arc::new(HttpConnector::default())))
}

/// Replace (or with `None`, clear) the process-wide default connection.
pub fn set_shared_instance(handle: Option<Arc<ConnectionHandle>>) {
    global().set_shared_instance(handle);
}

/// The process-wide default connection, created from the shared
/// configuration if none is set.
pub async fn shared_instance() -> Result<Arc<ConnectionHandle>, ConnectionError> {
    global().shared_instance().await
}

/// Replace the configuration used when a default must be created.
pub fn set_shared_config(config: Configuration) {
    global().set_shared_configuration(config);
}

/// Build an HTTP handle for `nodes` using the process-wide connector.
pub async fn connect<I, S>(
    nodes: I,
    options: ConnectionOptions,
) -> Result<ConnectionHandle, ConnectionError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ConnectionHandle::new(nodes, options, global().connector()).await
}
