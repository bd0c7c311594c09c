// Background refresh loop for the cache store.
// Re-fetches every watched path on a fixed interval until shutdown.

use std::sync::PoisonError;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

use super::store::CacheStore;

/// Lifecycle of the background refresher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherStatus {
    Idle,
    Running,
    Stopping,
    Stopped,
}

pub(super) enum Refresher {
    Idle,
    Running {
        stop: oneshot::Sender<()>,
        worker: JoinHandle<()>,
    },
    Stopping,
    Stopped,
}

impl Refresher {
    fn status(&self) -> RefresherStatus {
        match self {
            Refresher::Idle => RefresherStatus::Idle,
            Refresher::Running { .. } => RefresherStatus::Running,
            Refresher::Stopping => RefresherStatus::Stopping,
            Refresher::Stopped => RefresherStatus::Stopped,
        }
    }
}

impl CacheStore {
    pub fn status(&self) -> RefresherStatus {
        self.inner
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status()
    }

    /// Spawn the refresh loop. Returns immediately; must be called from
    /// within a Tokio runtime and only once per store.
    pub fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(CacheError::ZeroDuration("refresh interval"));
        }

        let mut state = self
            .inner
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !matches!(*state, Refresher::Idle) {
            return Err(CacheError::AlreadyStarted);
        }

        let (stop, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(refresh_loop(self.clone(), interval, stop_rx));
        *state = Refresher::Running { stop, worker };

        info!(interval_secs = interval.as_secs_f64(), "Background refresh started");
        Ok(())
    }

    /// Stop the refresh loop and wait for every in-flight refresh to finish.
    /// In-flight refreshes are not cancelled.
    pub async fn shutdown(&self) {
        let (stop, worker) = {
            let mut state = self
                .inner
                .refresher
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match std::mem::replace(&mut *state, Refresher::Stopping) {
                Refresher::Running { stop, worker } => (stop, worker),
                other => {
                    warn!(status = ?other.status(), "Tried to stop the refresher while it was not running");
                    *state = other;
                    return;
                }
            }
        };

        // The loop also exits if the sender is dropped, so a failed send is fine.
        let _ = stop.send(());
        if let Err(e) = worker.await {
            warn!(error = %e, "Refresh loop ended abnormally");
        }

        *self
            .inner
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Refresher::Stopped;
        info!("Background refresh stopped");
    }
}

async fn refresh_loop(store: CacheStore, period: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let timeout = store.config().fetch_timeout;

    // Refreshes spawned by this loop; drained before the loop returns.
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let paths = store.watched_paths().await;
                debug!(count = paths.len(), "Refreshing watched paths");
                for path in paths {
                    let store = store.clone();
                    in_flight.spawn(async move {
                        if let Err(e) = store.refresh_one(&path, timeout).await {
                            warn!(path = %path, error = %e, "Refresh failed, serving previous snapshot");
                        }
                    });
                }
                // Reap finished refreshes without waiting on the rest.
                while in_flight.try_join_next().is_some() {}
            }
        }
    }

    let pending = in_flight.len();
    if pending > 0 {
        debug!(pending, "Waiting for in-flight refreshes");
    }
    while in_flight.join_next().await.is_some() {}
    debug!("Refresh loop exited");
}
