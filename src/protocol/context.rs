use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::transport::connection::Connection;

/// One decoded inbound frame plus the path back to its sender.
///
/// Created per frame by the connection's reader and dropped once the handler
/// returns. Cloning is cheap: the payload and connection are shared.
#[derive(Clone)]
pub struct Context {
    protocol: u32,
    payload: Bytes,
    conn: Arc<Connection>,
}

impl Context {
    pub fn new(protocol: u32, payload: Bytes, conn: Arc<Connection>) -> Self {
        Self {
            protocol,
            payload,
            conn,
        }
    }

    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    /// Payload exactly as received.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn remote_addr(&self) -> &str {
        self.conn.remote_addr()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Reply to the sender under the same protocol id.
    ///
    /// Fails with `ConnectionClosed` once the connection is torn down and with
    /// `SendTimeout` when its outbound queue stays full.
    pub async fn write(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.conn.send(self.protocol, payload).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("protocol", &self.protocol)
            .field("len", &self.payload.len())
            .field("peer", &self.conn.remote_addr())
            .finish()
    }
}
