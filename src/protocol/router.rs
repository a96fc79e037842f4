use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::error::constants::{ERR_ROUTER_READ_LOCK, ERR_ROUTER_WRITE_LOCK};
use crate::error::{ProtocolError, Result};
use crate::protocol::context::Context;

/// A message handler bound to one protocol id.
///
/// Implemented for any `Fn(Context) -> impl Future<Output = ()>`, so plain
/// async closures register directly.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, ()> {
        Box::pin(self(ctx))
    }
}

/// Protocol id to handler table.
///
/// Shared by every connection and worker slot of a listener.
#[derive(Default)]
pub struct Router {
    handlers: RwLock<HashMap<u32, Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `protocol`.
    ///
    /// A second registration for the same id fails with
    /// [`ProtocolError::DuplicateProtocol`] and leaves the first in place.
    pub fn handle<H: Handler>(&self, protocol: u32, handler: H) -> Result<()> {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_ROUTER_WRITE_LOCK))?;

        if handlers.contains_key(&protocol) {
            return Err(ProtocolError::DuplicateProtocol(protocol));
        }
        handlers.insert(protocol, Arc::new(handler));

        debug!(protocol, "Handler registered");
        Ok(())
    }

    pub fn contains(&self, protocol: u32) -> bool {
        self.handlers
            .read()
            .map(|h| h.contains_key(&protocol))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the handler registered for the context's protocol.
    ///
    /// Unknown protocol ids are dropped silently; the client never hears
    /// about them.
    pub async fn dispatch(&self, ctx: Context) {
        let handler = match self.lookup(ctx.protocol()) {
            Ok(Some(handler)) => handler,
            Ok(None) => {
                trace!(protocol = ctx.protocol(), peer = %ctx.remote_addr(), "No handler, dropping frame");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Router lookup failed");
                return;
            }
        };

        handler.call(ctx).await;
    }

    // The lock is released before the handler runs.
    fn lookup(&self, protocol: u32) -> Result<Option<Arc<dyn Handler>>> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_ROUTER_READ_LOCK))?;
        Ok(handlers.get(&protocol).cloned())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::loopback_connection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_duplicate_registration_rejected() {
        let router = Router::new();
        router.handle(1, |_ctx: Context| async {}).unwrap();

        let err = router.handle(1, |_ctx: Context| async {}).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateProtocol(1)));
        assert_eq!(router.len(), 1);
        assert!(router.contains(1));
        assert!(!router.contains(2));
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_protocol() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Arc::new(Router::new());

        let counter = hits.clone();
        router
            .handle(7, move |ctx: Context| {
                let counter = counter.clone();
                async move {
                    assert_eq!(ctx.payload().as_ref(), b"x");
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let (conn, _peer) = loopback_connection(router.clone()).await;
        router
            .dispatch(Context::new(7, bytes::Bytes::from_static(b"x"), conn.clone()))
            .await;
        router
            .dispatch(Context::new(8, bytes::Bytes::from_static(b"x"), conn))
            .await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
