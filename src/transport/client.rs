//! Client-side connector.
//!
//! Opens a TCP stream and wraps it in [`PacketCodec`] so callers exchange
//! [`Message`](crate::core::message::Message) values with a listener through
//! `futures::SinkExt::send` and `futures::StreamExt::next`.

use std::io;
use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::core::codec::PacketCodec;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout::with_timeout_error;

/// Framed client stream
pub type ClientStream = Framed<TcpStream, PacketCodec>;

/// Connect to `addr`; inbound frames above `max_packet_size` fail to decode
/// (0 disables the check).
#[instrument(skip(addr))]
pub async fn connect<A: ToSocketAddrs>(addr: A, max_packet_size: u32) -> Result<ClientStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    debug!(peer = %stream.peer_addr()?, "Connected");
    Ok(Framed::new(stream, PacketCodec::new(max_packet_size)))
}

/// [`connect`] with a deadline; expiry surfaces as an `Io` error of kind
/// `TimedOut`.
pub async fn connect_timeout<A: ToSocketAddrs>(
    addr: A,
    max_packet_size: u32,
    timeout: Duration,
) -> Result<ClientStream> {
    with_timeout_error(
        connect(addr, max_packet_size),
        timeout,
        ProtocolError::Io(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    )
    .await
}
