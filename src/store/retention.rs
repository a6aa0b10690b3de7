//! Retention service for settled sessions.
//!
//! Runs as a background task owned by the host binary; the scheduler
//! never purges. Each tick deletes terminal sessions settled longer ago
//! than the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::SessionStore;

/// Purge cadence.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the retention purge background task.
#[must_use]
pub fn spawn_retention_task(
    store: Arc<SessionStore>,
    retention: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    purge(&store, retention);
                }
            }
        }
    })
}

/// Delete sessions settled more than `retention` ago. Returns how many went.
pub fn purge(store: &SessionStore, retention: Duration) -> usize {
    let Ok(window) = chrono::Duration::from_std(retention) else {
        error!(?retention, "retention window out of range; skipping purge");
        return 0;
    };
    let purged = store.purge_settled(Utc::now() - window);
    if purged > 0 {
        info!(purged, "retention purge completed");
    } else {
        debug!("retention purge found nothing to delete");
    }
    purged
}
