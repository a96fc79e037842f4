//! Timeout constants and helpers shared by the transport layer.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Bounded wait for enqueuing one outbound frame
pub const SEND_TIMEOUT: Duration = Duration::from_millis(5);

/// How long `run` waits for connection tasks after the listener stops
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run `fut` with a deadline, mapping expiry to `on_timeout`.
pub async fn with_timeout_error<F, T>(
    fut: F,
    duration: Duration,
    on_timeout: ProtocolError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}
