//! # Worker Pool
//!
//! A fixed set of bounded task queues, each drained by one long-lived task
//! that runs the router on whatever arrives.
//!
//! Work is routed by an FNV-1a hash of the originating connection's address,
//! so every frame from one connection lands on the same slot and is handled
//! in arrival order. Frames from different connections may interleave across
//! slots.
//!
//! A full slot blocks the dispatching reader with no timeout, which slows
//! ingestion from that one client. Outbound sends fail fast instead.
//!
//! Slots stop when the listener's shutdown token fires or once every sender
//! for their queue is gone. A handler already running always completes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::error::{ProtocolError, Result};
use crate::protocol::context::Context;
use crate::protocol::router::Router;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Slot index serving `addr` in a pool of `pool_size` slots.
///
/// A pure function of its inputs; an empty pool maps everything to 0.
pub fn slot_index(addr: &str, pool_size: usize) -> usize {
    if pool_size == 0 {
        return 0;
    }
    fnv1a(addr.as_bytes()) as usize % pool_size
}

/// Sharded pool of dispatch queues
pub struct WorkerPool {
    slots: Vec<mpsc::Sender<Context>>,
    router: Arc<Router>,
}

impl WorkerPool {
    /// Create `pool_size` queues of `queue_length` capacity and start one
    /// processing task per queue on `tracker`.
    ///
    /// A `pool_size` of 0 starts nothing; [`dispatch`](Self::dispatch) then
    /// runs the router inline.
    pub fn bootstrap(
        pool_size: usize,
        queue_length: usize,
        router: Arc<Router>,
        shutdown: CancellationToken,
        tracker: &TaskTracker,
    ) -> Self {
        let mut slots = Vec::with_capacity(pool_size);

        for slot in 0..pool_size {
            let (tx, rx) = mpsc::channel(queue_length.max(1));
            tracker.spawn(run_slot(slot, rx, router.clone(), shutdown.clone()));
            slots.push(tx);
        }

        if pool_size > 0 {
            info!(pool_size, queue_length, "Worker pool started");
        }

        Self { slots, router }
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Slot serving `addr` in this pool
    pub fn slot_for(&self, addr: &str) -> usize {
        slot_index(addr, self.slots.len())
    }

    /// Queue `ctx` on the slot owning its connection.
    ///
    /// Waits for space without a timeout. Fails with
    /// [`ProtocolError::WorkerPoolClosed`] once the slot has stopped.
    pub async fn dispatch(&self, ctx: Context) -> Result<()> {
        if self.slots.is_empty() {
            self.router.dispatch(ctx).await;
            return Ok(());
        }

        let slot = self.slot_for(ctx.remote_addr());
        trace!(slot, peer = %ctx.remote_addr(), protocol = ctx.protocol(), "Queueing frame");

        self.slots[slot]
            .send(ctx)
            .await
            .map_err(|_| ProtocolError::WorkerPoolClosed)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pool_size", &self.slots.len())
            .finish()
    }
}

async fn run_slot(
    slot: usize,
    mut rx: mpsc::Receiver<Context>,
    router: Arc<Router>,
    shutdown: CancellationToken,
) {
    debug!(slot, "Worker ready");

    loop {
        let ctx = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            ctx = rx.recv() => match ctx {
                Some(ctx) => ctx,
                None => break,
            },
        };

        trace!(slot, peer = %ctx.remote_addr(), protocol = ctx.protocol(), "Worker serving frame");
        router.dispatch(ctx).await;
    }

    debug!(slot, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::loopback_connection;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_slot_is_stable() {
        for addr in ["127.0.0.1:5000", "10.1.2.3:65535", "[::1]:80"] {
            let first = slot_index(addr, 8);
            assert!(first < 8);
            for _ in 0..100 {
                assert_eq!(slot_index(addr, 8), first);
            }
        }
        assert_eq!(slot_index("anything", 0), 0);
    }

    #[tokio::test]
    async fn test_same_connection_keeps_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = Arc::new(Router::new());

        let log = seen.clone();
        router
            .handle(1, move |ctx: Context| {
                let log = log.clone();
                async move {
                    log.lock().await.push(ctx.payload()[0]);
                }
            })
            .unwrap();

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = WorkerPool::bootstrap(4, 16, router.clone(), shutdown.clone(), &tracker);
        assert_eq!(pool.pool_size(), 4);

        let (conn, _peer) = loopback_connection(router).await;
        for i in 0..50u8 {
            pool.dispatch(Context::new(1, Bytes::from(vec![i]), conn.clone()))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().await.len() < 50 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().await, (0..50u8).collect::<Vec<_>>());

        shutdown.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_slot_blocks_dispatch() {
        let started = Arc::new(tokio::sync::Notify::new());
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let router = Arc::new(Router::new());

        let (on_start, permits) = (started.clone(), gate.clone());
        router
            .handle(1, move |_ctx: Context| {
                let on_start = on_start.clone();
                let permits = permits.clone();
                async move {
                    on_start.notify_one();
                    permits.acquire().await.unwrap().forget();
                }
            })
            .unwrap();

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = WorkerPool::bootstrap(1, 1, router.clone(), shutdown.clone(), &tracker);
        let (conn, _peer) = loopback_connection(router).await;
        let ctx = || Context::new(1, Bytes::new(), conn.clone());

        pool.dispatch(ctx()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), started.notified())
            .await
            .unwrap();
        pool.dispatch(ctx()).await.unwrap();

        let third = pool.dispatch(ctx());
        tokio::pin!(third);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut third)
                .await
                .is_err(),
            "dispatch into a full slot waits"
        );

        gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), &mut third)
            .await
            .unwrap()
            .unwrap();

        gate.add_permits(2);
        shutdown.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_fails() {
        let router = Arc::new(Router::new());
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = WorkerPool::bootstrap(1, 1, router.clone(), shutdown.clone(), &tracker);

        shutdown.cancel();
        tracker.close();
        tracker.wait().await;

        let (conn, _peer) = loopback_connection(router).await;
        let res = pool.dispatch(Context::new(1, Bytes::new(), conn)).await;
        assert!(matches!(res, Err(ProtocolError::WorkerPoolClosed)));
    }
}
