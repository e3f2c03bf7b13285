//! Periodic purge of expired sessions and stale limiter entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::service::AuthService;

/// Shortest accepted interval between cleanup runs.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task that eagerly removes expired sessions.
#[derive(Debug)]
pub struct SessionCleanup {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SessionCleanup {
    /// Spawn the cleanup loop on the current runtime.
    ///
    /// The first run happens one `interval` after spawning. Intervals below
    /// one millisecond are raised to it.
    pub fn spawn(service: Arc<AuthService>, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(&service).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("Session cleanup stopping");
                            break;
                        }
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Session cleanup started");
        Self { handle, shutdown }
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Session cleanup task failed");
        }
    }
}

/// Run a single cleanup cycle. Returns the number of sessions removed.
pub async fn run_once(service: &AuthService) -> usize {
    service.limiter().cleanup();
    match service.sessions().purge_expired().await {
        Ok(removed) => {
            if removed > 0 {
                info!(count = removed, "Expired sessions cleaned up");
            }
            removed
        }
        Err(e) => {
            error!(error = %e, "Session cleanup failed");
            0
        }
    }
}
