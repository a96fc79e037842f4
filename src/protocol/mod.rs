//! # Protocol Layer
//!
//! Handler-facing half of the engine.
//!
//! ## Components
//! - **Context**: one decoded inbound frame and the reply path to its sender
//! - **Router**: protocol id to handler table with dispatch
//!
//! Handlers are async closures taking a [`Context`](context::Context). They
//! run either on the connection's reader or on a worker slot, depending on the
//! listener's worker pool size.

pub mod context;
pub mod router;

pub use context::Context;
pub use router::{Handler, Router};
