//! The shared-instance registry: the default connection and the default
//! configuration used by every object that is not given a connection.
//!
//! Writers replace the slot under a lock, so a reader always observes the
//! most recently completed write. Objects resolve their connection once, at
//! construction; later changes here never rebind them.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Configuration;
use crate::connection::ConnectionHandle;
use crate::error::ConnectionError;
use crate::transport::Connector;

#[derive(Default)]
struct Slot {
    instance: Option<Arc<ConnectionHandle>>,
    config: Configuration,
}

/// Holds at most one default [`ConnectionHandle`] and one default
/// [`Configuration`].
pub struct InstanceRegistry {
    connector: Arc<dyn Connector>,
    slot: RwLock<Slot>,
}

impl InstanceRegistry {
    /// An empty registry; lazily created defaults connect through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slot: RwLock::new(Slot::default()),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the default handle. `None` clears it; the next
    /// [`shared_instance`](Self::shared_instance) then builds a fresh one from
    /// the default configuration.
    pub fn set_shared_instance(&self, handle: Option<Arc<ConnectionHandle>>) {
        if let Some(h) = &handle {
            tracing::debug!(url = %h.url(), "shared instance replaced");
        } else {
            tracing::debug!("shared instance cleared");
        }
        self.write().instance = handle;
    }

    pub fn clear_shared_instance(&self) {
        self.set_shared_instance(None);
    }

    /// The current default without creating one.
    pub fn current_instance(&self) -> Option<Arc<ConnectionHandle>> {
        self.read().instance.clone()
    }

    /// The default handle, created from the default configuration if absent.
    ///
    /// Creation failure is returned to the caller and nothing is stored.
    pub async fn shared_instance(&self) -> Result<Arc<ConnectionHandle>, ConnectionError> {
        let config = {
            let slot = self.read();
            if let Some(handle) = &slot.instance {
                return Ok(Arc::clone(handle));
            }
            slot.config.clone()
        };

        tracing::debug!(nodes = ?config.node, "creating shared instance from configuration");
        let created = Arc::new(ConnectionHandle::from_configuration(&config, self.connector()).await?);

        // A default set while we were connecting wins over ours.
        let mut slot = self.write();
        Ok(Arc::clone(slot.instance.get_or_insert(created)))
    }

    /// Replace the configuration used for lazily created defaults. An
    /// already-materialized default is left alone.
    pub fn set_shared_configuration(&self, config: Configuration) {
        self.write().config = config;
    }

    pub fn shared_configuration(&self) -> Configuration {
        self.read().config.clone()
    }

    /// Bind to `explicit` if given, otherwise to the shared default.
    pub async fn resolve(
        &self,
        explicit: Option<Arc<ConnectionHandle>>,
    ) -> Result<Arc<ConnectionHandle>, ConnectionError> {
        match explicit {
            Some(handle) => Ok(handle),
            None => self.shared_instance().await,
        }
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.read();
        f.debug_struct("InstanceRegistry")
            .field("instance", &slot.instance.as_ref().map(|h| h.url().to_string()))
            .field("config", &slot.config)
            .finish()
    }
}
