//! # Connection Session
//!
//! One accepted socket driven by a reader task and a writer task.
//!
//! ## Lifecycle
//! ```text
//! Created ──handle()──► Running ──cancel──► Closing ──teardown──► Closed
//! ```
//! - **Created**: registered with the [`Manager`], no I/O yet
//! - **Running**: reader and writer spawned, `handle()` parked on the token
//! - **Closing**: entered exactly once, from `close()`, an I/O or framing
//!   error on either task, or a registry-wide clear
//! - **Closed**: registry entry removed, outbound queue shut, writer stopped
//!   and the socket shut down for writing
//!
//! ## Backpressure
//! Outbound frames go through a bounded queue. [`Connection::send`] waits at
//! most `send_timeout` for space and then fails with `SendTimeout`, so a
//! stalled client costs dropped replies rather than memory or a stuck caller.
//!
//! No read or write deadline applies to the socket itself. A peer that stops
//! talking keeps its tasks parked until the socket errors or the connection is
//! cancelled.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ServerConfig;
use crate::core::message::Message;
use crate::core::packet::{self, HEADER_SIZE};
use crate::error::{ProtocolError, Result};
use crate::protocol::context::Context;
use crate::protocol::router::Router;
use crate::transport::manager::{Managed, Manager};
use crate::transport::worker::WorkerPool;
use crate::utils::metrics::global_metrics;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Created = 0,
    Running = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A live client session
pub struct Connection {
    remote_addr: String,
    stream: Mutex<Option<TcpStream>>,
    outbound_tx: mpsc::Sender<Bytes>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    manager: Arc<Manager>,
    router: Arc<Router>,
    pool: Arc<WorkerPool>,
    max_packet_size: u32,
    send_timeout: Duration,
    cancel: CancellationToken,
    state: AtomicU8,
}

impl Connection {
    /// Wrap an accepted socket and register it with `manager`.
    pub async fn new(
        stream: TcpStream,
        manager: Arc<Manager>,
        router: Arc<Router>,
        pool: Arc<WorkerPool>,
        config: &ServerConfig,
    ) -> Result<Arc<Self>> {
        let remote_addr = stream.peer_addr()?.to_string();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_length.max(1));

        let conn = Arc::new(Self {
            remote_addr,
            stream: Mutex::new(Some(stream)),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            manager,
            router,
            pool,
            max_packet_size: config.max_packet_size,
            send_timeout: config.send_timeout,
            cancel: CancellationToken::new(),
            state: AtomicU8::new(ConnectionState::Created as u8),
        });

        conn.manager.add(conn.clone()).await;
        global_metrics().connection_established();
        Ok(conn)
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether teardown has been requested or has already run
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.state() >= ConnectionState::Closing
    }

    /// Run the session until it is cancelled, then tear it down.
    ///
    /// Spawns the reader and writer and parks on the cancellation token.
    /// Only the first call does anything; later calls fail with
    /// `ConnectionClosed`.
    pub async fn handle(self: Arc<Self>) -> Result<()> {
        let stream = self.stream.lock().ok().and_then(|mut s| s.take());
        let outbound_rx = self.outbound_rx.lock().ok().and_then(|mut rx| rx.take());
        let (Some(stream), Some(outbound_rx)) = (stream, outbound_rx) else {
            return Err(ProtocolError::ConnectionClosed);
        };

        let _ = self.state.compare_exchange(
            ConnectionState::Created as u8,
            ConnectionState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!(peer = %self.remote_addr, "Connection running");

        let (reader, writer) = stream.into_split();
        let read_task = tokio::spawn(self.clone().read_loop(reader));
        let write_task = tokio::spawn(self.clone().write_loop(writer, outbound_rx));

        self.cancel.cancelled().await;
        self.teardown(read_task, write_task).await;
        Ok(())
    }

    /// Encode a frame and queue it for the writer.
    ///
    /// Fails with `ConnectionClosed` once teardown has begun, `Pack` if the
    /// payload cannot be framed, and `SendTimeout` if the outbound queue stays
    /// full for `send_timeout`; the frame is dropped in that case.
    pub async fn send(&self, protocol: u32, payload: impl Into<Bytes>) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let frame = packet::encode(&Message::new(protocol, payload)).map_err(|e| {
            warn!(peer = %self.remote_addr, protocol, error = %e, "Failed to pack outbound frame");
            e
        })?;

        match self.outbound_tx.send_timeout(frame, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                global_metrics().send_timeout();
                warn!(peer = %self.remote_addr, protocol, "Outbound queue full, dropping frame");
                Err(ProtocolError::SendTimeout)
            }
            Err(SendTimeoutError::Closed(_)) => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Request teardown. Safe to call any number of times from anywhere.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf) {
        // Cancels on every exit path, including a panicking handler.
        let _guard = self.cancel.clone().drop_guard();
        trace!(peer = %self.remote_addr, "Reader running");

        loop {
            let msg = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                res = read_message(&mut reader, self.max_packet_size) => match res {
                    Ok(msg) => msg,
                    Err(e) => {
                        self.log_read_error(&e);
                        break;
                    }
                },
            };

            global_metrics().frame_received(u64::from(msg.length()));
            let (protocol, payload) = msg.into_parts();
            let ctx = Context::new(protocol, payload, self.clone());

            if self.pool.pool_size() > 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    res = self.pool.dispatch(ctx) => {
                        if let Err(e) = res {
                            debug!(peer = %self.remote_addr, error = %e, "Dispatch failed");
                            break;
                        }
                    }
                }
            } else {
                self.router.dispatch(ctx).await;
            }
        }

        trace!(peer = %self.remote_addr, "Reader exited");
    }

    async fn write_loop(
        self: Arc<Self>,
        mut writer: OwnedWriteHalf,
        mut outbound_rx: mpsc::Receiver<Bytes>,
    ) {
        let _guard = self.cancel.clone().drop_guard();
        trace!(peer = %self.remote_addr, "Writer running");

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let res = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                res = writer.write_all(&frame) => res,
            };
            if let Err(e) = res {
                debug!(peer = %self.remote_addr, error = %e, "Write failed");
                break;
            }
            global_metrics().frame_sent(frame.len() as u64);
        }

        outbound_rx.close();
        let _ = writer.shutdown().await;
        trace!(peer = %self.remote_addr, "Writer exited");
    }

    async fn teardown(self: &Arc<Self>, read_task: JoinHandle<()>, write_task: JoinHandle<()>) {
        if self
            .state
            .fetch_max(ConnectionState::Closing as u8, Ordering::AcqRel)
            >= ConnectionState::Closing as u8
        {
            return;
        }
        debug!(peer = %self.remote_addr, "Connection closing");

        self.manager.del(self).await;

        if let Some(mut rx) = self.outbound_rx.lock().ok().and_then(|mut rx| rx.take()) {
            rx.close();
        }

        // The writer exits on cancellation and shuts down its half. The
        // reader may be inside a direct-dispatch handler; it is detached and
        // releases its half once that handler returns.
        if let Err(e) = write_task.await {
            warn!(peer = %self.remote_addr, error = %e, "Writer task failed");
        }
        drop(read_task);

        self.state.store(ConnectionState::Closed as u8, Ordering::Release);
        global_metrics().connection_closed();
        debug!(peer = %self.remote_addr, "Connection closed");
    }

    fn log_read_error(&self, err: &ProtocolError) {
        match err {
            ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(peer = %self.remote_addr, "Peer closed connection");
            }
            ProtocolError::FrameTooLarge { .. } | ProtocolError::MalformedHeader => {
                global_metrics().protocol_error();
                warn!(peer = %self.remote_addr, error = %err, "Rejecting frame, closing connection");
            }
            _ => {
                debug!(peer = %self.remote_addr, error = %err, "Read failed");
            }
        }
    }
}

impl Managed for Connection {
    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    fn close(&self) {
        Connection::close(self);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Read one frame: exactly [`HEADER_SIZE`] bytes, then exactly the declared
/// payload length.
pub async fn read_message<R>(reader: &mut R, max_packet_size: u32) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let mut msg = packet::decode_header(&header, max_packet_size)?;
    if msg.length() > 0 {
        let mut payload = vec![0u8; msg.length() as usize];
        reader.read_exact(&mut payload).await?;
        msg.set_payload(payload);
    }
    Ok(msg)
}
