//! # Error Types
//!
//! Error handling for the session engine.
//!
//! This module defines every error variant that can surface from framing,
//! connection I/O, dispatch setup and listener startup.
//!
//! ## Error Categories
//! - **I/O Errors**: short reads, resets, EOF on a connection's socket
//! - **Framing Errors**: oversized or malformed frame headers
//! - **Send Errors**: closed connections and saturated outbound queues
//! - **Setup Errors**: bind failures, duplicate handlers, bad configuration
//!
//! Per-connection errors only ever tear down the connection that produced them.
//! Setup errors are fatal and returned to whoever started the listener.
//!
//! ## Example Usage
//! ```rust
//! use orbit::core::packet::decode_header;
//! use orbit::error::ProtocolError;
//!
//! let header = [16u8, 0, 0, 0, 1, 0, 0, 0];
//! match decode_header(&header, 8) {
//!     Err(ProtocolError::FrameTooLarge { size, max }) => assert_eq!((size, max), (16, 8)),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Router lock errors
    pub const ERR_ROUTER_WRITE_LOCK: &str = "Failed to acquire write lock on router";
    pub const ERR_ROUTER_READ_LOCK: &str = "Failed to acquire read lock on router";

    /// Setup errors
    pub const ERR_ROUTER_MISSING: &str = "router is not configured";
    pub const ERR_LOGGING_INIT: &str = "Failed to install global tracing subscriber";
}

// ProtocolError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("Malformed frame header")]
    MalformedHeader,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send timed out: outbound queue is full")]
    SendTimeout,

    #[error("Pack error: {0}")]
    Pack(String),

    #[error("Worker pool is shut down")]
    WorkerPoolClosed,

    #[error("Connection not found: {0}")]
    NotFound(String),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Duplicate protocol registration: {0}")]
    DuplicateProtocol(u32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl ProtocolError {
    /// Whether the caller can simply ignore or retry the failed operation.
    ///
    /// Only send-side failures are recoverable; everything else either tore a
    /// connection down already or is fatal at setup time.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::SendTimeout)
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_variants() {
        assert!(ProtocolError::SendTimeout.is_recoverable());
        assert!(ProtocolError::ConnectionClosed.is_recoverable());
        assert!(!ProtocolError::MalformedHeader.is_recoverable());
        assert!(!ProtocolError::DuplicateProtocol(1).is_recoverable());
    }

    #[test]
    fn test_display_includes_limits() {
        let err = ProtocolError::FrameTooLarge { size: 10, max: 4 };
        assert_eq!(err.to_string(), "Frame too large: 10 bytes (max 4)");
    }

    #[test]
    fn test_io_conversion() {
        let err: ProtocolError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
