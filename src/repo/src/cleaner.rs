//! Background sweep of stale nodes and expired reports.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::Repo;

/// Periodically runs [`Repo::clean_stale_records`] until stopped.
pub struct StaleRecordsCleaner {
    /// Background sweep task handle.
    handle: JoinHandle<()>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
}

impl StaleRecordsCleaner {
    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// Returns `None` when report retention is zero: history is kept forever
    /// and nothing is ever purged.
    pub fn start(repo: Repo) -> Option<Self> {
        let opts = *repo.options();
        if opts.retention.is_zero() {
            tracing::info!("Report retention is disabled, stale records cleaner not started");
            return None;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Stale records cleaner shutting down");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(opts.cleaner_interval) => {
                        let repo = repo.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            repo.clean_stale_records(opts.node_retention)
                        })
                        .await;

                        match result {
                            Ok(Ok(stats)) if !stats.is_empty() => {
                                tracing::info!(
                                    nodes = stats.nodes,
                                    images = stats.images,
                                    filesystems = stats.filesystems,
                                    "Deleted stale records"
                                );
                            }
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => {
                                tracing::warn!(error = %e, "Failed to delete stale records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Stale records sweep panicked");
                            }
                        }
                    }
                }
            }
        });

        tracing::info!(
            interval_secs = opts.cleaner_interval.as_secs(),
            retention_secs = opts.retention.as_secs(),
            node_retention_secs = opts.node_retention.as_secs(),
            "Stale records cleaner started"
        );

        Some(Self {
            handle,
            shutdown_tx,
        })
    }

    /// Signal the loop to stop and wait up to `timeout` for it to finish.
    ///
    /// Returns `true` if the loop acknowledged in time.
    pub async fn stop(self, timeout: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(_) => {
                tracing::info!("Stale records cleaner was shut down");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs_f64(),
                    "Timed out waiting for stale records cleaner to stop"
                );
                false
            }
        }
    }
}
