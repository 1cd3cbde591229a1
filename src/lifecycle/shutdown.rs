//! Shutdown coordination.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks (the API server, the health monitor supervisor)
/// subscribe and exit when the signal fires.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Spawn a task that triggers shutdown on SIGINT or SIGTERM.
    pub fn listen_for_signals(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();

            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(sig) => sig,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to install SIGTERM handler");
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                }
            }

            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
                tracing::info!("received ctrl-c");
            }

            let _ = tx.send(());
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
