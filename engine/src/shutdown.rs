//! Stop flag for background loops such as the expiry watcher.
//!
//! The flag is a `tokio::sync::watch` channel: once tripped it stays tripped,
//! so a loop that subscribes late still sees it.

use tokio::signal;
use tokio::sync::watch;

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Receiver whose value turns `true` once shutdown is requested.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trip the flag on the first SIGINT or SIGTERM.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("received SIGINT, stopping"),
            _ = terminate() => tracing::info!("received SIGTERM, stopping"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_observe_the_flag() {
        let controller = ShutdownController::new();
        let mut early = controller.subscribe();
        assert!(!*early.borrow());

        controller.shutdown();
        assert!(controller.is_shutdown());
        assert!(early.wait_for(|stopped| *stopped).await.is_ok());

        let late = controller.subscribe();
        assert!(*late.borrow());
    }
}
