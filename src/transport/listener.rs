//! # Listener
//!
//! Owns the listening socket, the connection registry and the worker pool.
//!
//! ## Responsibilities
//! - Resolve and bind the configured address
//! - Start the worker pool, then accept connections until stopped
//! - Reject connections beyond `max_connections` by closing them immediately
//! - Stop on an OS signal or external cancellation, closing every live
//!   connection and the listening socket
//!
//! ## Shutdown ordering
//! `off()` cancels the accept loop and then clears the registry, asking each
//! connection to close. The accept loop drops the listening socket as it
//! exits. `run()` then waits up to `shutdown_timeout` for connection and
//! worker tasks to finish.

use std::io;
use std::sync::Arc;

use tokio::net::{lookup_host, TcpListener};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::constants::ERR_ROUTER_MISSING;
use crate::error::{ProtocolError, Result};
use crate::protocol::router::Router;
use crate::transport::connection::Connection;
use crate::transport::manager::Manager;
use crate::transport::signal;
use crate::transport::worker::WorkerPool;
use crate::utils::metrics::global_metrics;

/// Builder for [`Server`]
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<ServerConfig>,
    router: Option<Arc<Router>>,
    cancellation: Option<CancellationToken>,
}

impl ServerBuilder {
    /// Listener settings; defaults apply when not set
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Handler table shared by every connection (required)
    pub fn router(mut self, router: Arc<Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// External token that stops [`Server::run`] when cancelled
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fails with `ConfigError` when no router was supplied or the
    /// configuration does not validate.
    pub fn build(self) -> Result<Server> {
        let router = self
            .router
            .ok_or_else(|| ProtocolError::ConfigError(ERR_ROUTER_MISSING.to_string()))?;
        let config = self.config.unwrap_or_default();

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        Ok(Server {
            config,
            router,
            manager: Arc::new(Manager::new()),
            cancellation: self.cancellation.unwrap_or_default(),
            stop: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

/// A single-socket TCP listener
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    manager: Arc<Manager>,
    cancellation: CancellationToken,
    stop: CancellationToken,
    tracker: TaskTracker,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Resolve the configured address and open the listening socket.
    #[instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.config.address();
        let bind_error = |source: io::Error| ProtocolError::Bind {
            address: address.clone(),
            source,
        };

        let network = self.config.network;
        let addr = lookup_host(&address)
            .await
            .map_err(bind_error)?
            .find(|a| network.accepts(a))
            .ok_or_else(|| {
                bind_error(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no {network:?} address for {address}"),
                ))
            })?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        info!(local = %listener.local_addr()?, "Listening");
        Ok(listener)
    }

    /// Start the worker pool and accept on `listener` until [`off`](Self::off).
    ///
    /// Returns `Ok(())` once stopped; the listening socket is dropped on
    /// return.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let pool = Arc::new(WorkerPool::bootstrap(
            self.config.worker_pool_size,
            self.config.worker_queue_length,
            self.router.clone(),
            self.stop.clone(),
            &self.tracker,
        ));

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!("Listener closed");
                    return Ok(());
                }
                res = listener.accept() => match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        continue;
                    }
                },
            };

            if self.manager.len().await >= self.config.max_connections {
                global_metrics().connection_rejected();
                warn!(
                    peer = %peer,
                    max_connections = self.config.max_connections,
                    "Connection limit reached, rejecting"
                );
                drop(stream);
                continue;
            }

            debug!(peer = %peer, "Connection established");
            let conn = match Connection::new(
                stream,
                self.manager.clone(),
                self.router.clone(),
                pool.clone(),
                &self.config,
            )
            .await
            {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Failed to set up connection");
                    continue;
                }
            };

            // Raced with off(): the registry may already be cleared.
            if self.stop.is_cancelled() {
                conn.close();
            }

            self.tracker.spawn(async move {
                if let Err(e) = conn.handle().await {
                    debug!(peer = %peer, error = %e, "Connection ended with error");
                }
            });
        }
    }

    /// Bind and serve until stopped.
    pub async fn on(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Stop accepting and close every live connection.
    ///
    /// Idempotent; stopping an already stopped listener succeeds.
    #[instrument(skip(self))]
    pub async fn off(&self) -> Result<()> {
        info!("Listener closing");
        // Cancel first: the accept loop closes anything it registers after
        // this point, and clear() catches everything registered before it.
        self.stop.cancel();
        self.manager.clear().await;
        Ok(())
    }

    /// Alias for [`off`](Self::off).
    pub async fn shutdown(&self) -> Result<()> {
        self.off().await
    }

    /// Serve until a shutdown signal or external cancellation, then stop.
    ///
    /// Startup failures such as a bind error are returned. External
    /// cancellation is a normal stop and yields `Ok(())`.
    #[instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn run(&self) -> Result<()> {
        info!("Listener starting");

        let serve = self.on();
        tokio::pin!(serve);

        let result = tokio::select! {
            res = &mut serve => res,
            reason = self.shutdown_requested() => {
                info!(reason, "Shutdown requested");
                self.off().await?;
                serve.await
            }
        };

        self.drain().await;
        result
    }

    /// Wait up to `shutdown_timeout` for connection and worker tasks.
    ///
    /// Returns whether everything finished in time.
    pub async fn drain(&self) -> bool {
        self.tracker.close();
        global_metrics().log_metrics();
        match tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("Listener stopped");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "Shutdown timeout reached, forcing exit"
                );
                false
            }
        }
    }

    async fn shutdown_requested(&self) -> &'static str {
        tokio::select! {
            _ = self.cancellation.cancelled() => "cancelled",
            res = signal::wait_for_signal(&self.config.shutdown_signals) => match res {
                Ok(sig) => sig.as_str(),
                Err(e) => {
                    warn!(error = %e, "Failed to install signal handlers");
                    self.cancellation.cancelled().await;
                    "cancelled"
                }
            },
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.config.address())
            .field("stopped", &self.stop.is_cancelled())
            .finish()
    }
}
