//! # Connection Registry
//!
//! Thread-safe map of live connections keyed by remote address.
//!
//! The listener owns one [`Manager`] and hands it to every connection it
//! creates. Connections register themselves on construction and remove
//! themselves during teardown; the listener only ever calls [`Manager::clear`]
//! on shutdown.
//!
//! Re-registering an address that is already present replaces the old entry
//! and asks the old connection to close. Removal is by identity, so a stale
//! connection finishing its teardown late never evicts its replacement.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProtocolError, Result};
use crate::transport::connection::Connection;

/// What the registry needs from a connection.
///
/// Implemented by [`Connection`]; tests substitute lightweight mocks.
pub trait Managed: Send + Sync + 'static {
    /// Registry key
    fn remote_addr(&self) -> &str;

    /// Request teardown. Must be idempotent and must not block.
    fn close(&self);
}

/// Registry of live connections
pub struct Manager<C: Managed = Connection> {
    conns: RwLock<HashMap<String, Arc<C>>>,
}

impl<C: Managed> Manager<C> {
    pub fn new() -> Self {
        Self {
            conns: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `conn` under its remote address.
    pub async fn add(&self, conn: Arc<C>) {
        let mut conns = self.conns.write().await;
        let addr = conn.remote_addr().to_string();

        if let Some(previous) = conns.insert(addr.clone(), conn) {
            debug!(peer = %addr, "Address re-registered, closing previous connection");
            previous.close();
        }

        debug!(peer = %addr, connections = conns.len(), "Connection registered");
    }

    /// Look up a live connection by remote address.
    pub async fn get(&self, addr: &str) -> Result<Arc<C>> {
        self.conns
            .read()
            .await
            .get(addr)
            .cloned()
            .ok_or_else(|| ProtocolError::NotFound(addr.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.conns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conns.read().await.is_empty()
    }

    /// Remove `conn` if it is still the entry registered under its address.
    ///
    /// Returns whether an entry was removed; calling it twice is harmless.
    pub async fn del(&self, conn: &Arc<C>) -> bool {
        let mut conns = self.conns.write().await;
        let addr = conn.remote_addr();

        let is_current = conns
            .get(addr)
            .is_some_and(|current| Arc::ptr_eq(current, conn));
        if is_current {
            conns.remove(addr);
            debug!(peer = %addr, connections = conns.len(), "Connection unregistered");
        }
        is_current
    }

    /// Request closure of every connection and empty the map.
    ///
    /// Runs under a single write lock. It does not wait for any connection's
    /// teardown to finish; those later `del` calls find nothing to remove.
    pub async fn clear(&self) {
        let mut conns = self.conns.write().await;
        for (addr, conn) in conns.drain() {
            conn.close();
            debug!(peer = %addr, "Connection closed by registry");
        }
        info!("All connections cleared");
    }
}

impl<C: Managed> Default for Manager<C> {
    fn default() -> Self {
        Self::new()
    }
}
