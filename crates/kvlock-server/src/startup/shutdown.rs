//! Graceful shutdown handling for the kvlock server
//!
//! Ctrl+C or SIGTERM trips a shared [`CancelSignal`]. Lock acquisitions that
//! carry it abandon their wait, and the HTTP server stops accepting work.

use std::future::Future;

use kvlock_core::CancelSignal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Listen for Ctrl+C or SIGTERM and trip `shutdown` when one arrives.
pub fn spawn_signal_listener(shutdown: CancelSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = shutdown.cancelled() => {
                return;
            }
        }

        shutdown.cancel();
    })
}

/// Run a future with graceful shutdown support
///
/// Returns `None` if `shutdown` fires first; the future is dropped.
pub async fn run_with_shutdown<F>(future: F, shutdown: &CancelSignal) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        result = future => Some(result),
        _ = shutdown.cancelled() => {
            warn!("Shutdown signal received, cancelling operation");
            None
        }
    }
}
