//! Operating-system shutdown signals.

use std::io;

use crate::config::ShutdownSignal;

impl ShutdownSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Hangup => "SIGHUP",
            ShutdownSignal::Quit => "SIGQUIT",
        }
    }
}

/// Resolve with the first of `signals` delivered to the process.
///
/// An empty set never resolves. Fails if a handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_signal(signals: &[ShutdownSignal]) -> io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    if signals.is_empty() {
        return futures::future::pending().await;
    }

    let mut waits = Vec::with_capacity(signals.len());
    for &sig in signals {
        let kind = match sig {
            ShutdownSignal::Interrupt => SignalKind::interrupt(),
            ShutdownSignal::Terminate => SignalKind::terminate(),
            ShutdownSignal::Hangup => SignalKind::hangup(),
            ShutdownSignal::Quit => SignalKind::quit(),
        };
        let mut stream = signal(kind)?;
        waits.push(Box::pin(async move {
            stream.recv().await;
            sig
        }));
    }

    let (sig, _, _) = futures::future::select_all(waits).await;
    Ok(sig)
}

/// Resolve with the first of `signals` delivered to the process.
///
/// Only Ctrl-C is observable here; the other signals never resolve.
#[cfg(not(unix))]
pub async fn wait_for_signal(signals: &[ShutdownSignal]) -> io::Result<ShutdownSignal> {
    if signals.contains(&ShutdownSignal::Interrupt) {
        tokio::signal::ctrl_c().await?;
        Ok(ShutdownSignal::Interrupt)
    } else {
        futures::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_set_never_resolves() {
        let res = tokio::time::timeout(Duration::from_millis(20), wait_for_signal(&[])).await;
        assert!(res.is_err());
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(ShutdownSignal::Interrupt.as_str(), "SIGINT");
        assert_eq!(ShutdownSignal::Terminate.as_str(), "SIGTERM");
    }
}
