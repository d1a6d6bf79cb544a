//! Signal-driven graceful shutdown.

use std::future::Future;
use std::time::Duration;

/// Wait for SIGINT or SIGTERM, then run `shutdown` for at most `timeout`.
///
/// Returns `false` if shutdown did not finish in time.
pub async fn wait_for_shutdown<F>(timeout: Duration, shutdown: F) -> bool
where
    F: Future<Output = ()>,
{
    shutdown_on(termination_signal(), timeout, shutdown).await
}

/// [`wait_for_shutdown`] with an arbitrary trigger.
pub async fn shutdown_on<S, F>(signal: S, timeout: Duration, shutdown: F) -> bool
where
    S: Future<Output = &'static str>,
    F: Future<Output = ()>,
{
    let name = signal.await;
    tracing::info!(signal = name, "Shutting down");

    match tokio::time::timeout(timeout, shutdown).await {
        Ok(()) => {
            tracing::info!("Server was shut down");
            true
        }
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Shutdown timed out");
            false
        }
    }
}

#[cfg(unix)]
async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
