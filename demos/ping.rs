//! Example: Ping/Pong
//!
//! Starts a listener with one handler on protocol 1 that answers every ping
//! with a pong, then connects a client, exchanges a few frames and shuts the
//! listener down through its cancellation token.
//!
//! Run with: `cargo run --example ping`

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use orbit::config::{LoggingConfig, ServerConfig};
use orbit::protocol::{Context, Router};
use orbit::transport::{client, Server};
use orbit::utils::{global_metrics, logging};
use orbit::Message;
use tracing::{info, warn};

const PING: u32 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&LoggingConfig::default())?;

    let router = Arc::new(Router::new());
    router.handle(PING, |ctx: Context| async move {
        info!(peer = %ctx.remote_addr(), payload = ?ctx.payload(), "ping");
        if let Err(e) = ctx.write("pong").await {
            warn!(error = %e, "reply dropped");
        }
    })?;

    let config = ServerConfig {
        port: 0,
        shutdown_signals: Vec::new(),
        ..ServerConfig::default()
    };
    let server = Arc::new(Server::builder().config(config).router(router).build()?);

    // Bind first so the client knows the ephemeral port.
    let listener = server.bind().await?;
    let addr = listener.local_addr()?;
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let mut conn = client::connect_timeout(addr, 4096, Duration::from_secs(1)).await?;
    for i in 0..3 {
        conn.send(Message::new(PING, format!("ping {i}"))).await?;
        match conn.next().await {
            Some(Ok(reply)) => println!(
                "reply #{i}: {}",
                String::from_utf8_lossy(reply.payload())
            ),
            Some(Err(e)) => return Err(e.into()),
            None => break,
        }
    }

    server.off().await?;
    serving.await??;
    server.drain().await;

    println!("{:?}", global_metrics().snapshot());
    Ok(())
}
