//! # Transport Layer
//!
//! Sockets, sessions and the machinery around them.
//!
//! ## Components
//! - **Listener**: bind, accept loop, connection ceiling, shutdown
//! - **Connection**: per-client reader/writer pair with bounded outbound queue
//! - **Manager**: address-keyed registry of live connections
//! - **Worker**: sharded dispatch queues keyed by client address
//! - **Signal**: OS shutdown signal wait
//! - **Client**: framed connector for talking to a listener

pub mod client;
pub mod connection;
pub mod listener;
pub mod manager;
pub mod signal;
pub mod worker;

pub use connection::{Connection, ConnectionState};
pub use listener::{Server, ServerBuilder};
pub use manager::{Managed, Manager};
pub use worker::WorkerPool;
