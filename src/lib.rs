//! # Orbit
//!
//! A lightweight TCP session engine: accept connections, frame inbound bytes
//! into messages, route each message to a handler by protocol id, and let
//! handlers reply through the originating connection.
//!
//! ## Architecture
//! - **core**: message type, wire format, Tokio codec
//! - **protocol**: handler context and router
//! - **transport**: listener, connection sessions, registry, worker pool
//! - **config**: TOML/env configuration with validation
//! - **utils**: logging setup, metrics counters, timeouts
//!
//! ## Wire Format
//! ```text
//! [Length(4, LE)] [Protocol(4, LE)] [Payload(Length)]
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use orbit::config::ServerConfig;
//! use orbit::protocol::{Context, Router};
//! use orbit::transport::Server;
//!
//! # async fn start() -> orbit::Result<()> {
//! let router = Arc::new(Router::new());
//! router.handle(1, |ctx: Context| async move {
//!     let _ = ctx.write("pong").await;
//! })?;
//!
//! let server = Server::builder()
//!     .config(ServerConfig::default())
//!     .router(router)
//!     .build()?;
//! server.run().await
//! # }
//! ```

#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::{NetworkConfig, ServerConfig};
pub use core::message::Message;
pub use error::{ProtocolError, Result};
pub use protocol::{Context, Handler, Router};
pub use transport::{Connection, Server, ServerBuilder};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    use crate::config::ServerConfig;
    use crate::protocol::router::Router;
    use crate::transport::connection::Connection;
    use crate::transport::manager::Manager;
    use crate::transport::worker::WorkerPool;

    /// A registered, not yet handled connection plus the client end of its
    /// socket.
    pub(crate) async fn loopback_connection(router: Arc<Router>) -> (Arc<Connection>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server_side, _) = accepted.unwrap();

        let pool = Arc::new(WorkerPool::bootstrap(
            0,
            0,
            router.clone(),
            CancellationToken::new(),
            &TaskTracker::new(),
        ));
        let conn = Connection::new(
            server_side,
            Arc::new(Manager::new()),
            router,
            pool,
            &ServerConfig::default(),
        )
        .await
        .unwrap();

        (conn, client.unwrap())
    }
}
