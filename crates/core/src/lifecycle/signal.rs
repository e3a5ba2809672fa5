//! Shutdown signal handling (SIGTERM/SIGINT).

use tokio::sync::watch;

/// Listens for OS termination signals and flips a watch channel to `true`.
pub struct SignalHandler {
    shutdown_tx: watch::Sender<bool>,
}

impl SignalHandler {
    /// Create a handler and a receiver that becomes `true` on shutdown.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    /// Wait for SIGINT / SIGTERM (Ctrl+C only on non-unix), then signal
    /// shutdown.
    pub async fn run(self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Received SIGINT, initiating shutdown...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating shutdown...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {e}; listening for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Received SIGINT, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        self.trigger();
    }

    /// Signal shutdown without waiting for an OS signal.
    pub fn trigger(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
