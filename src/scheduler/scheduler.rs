use crate::config::Config;
use crate::persistence::snapshot::SnapshotManager;
use crate::ratelimit::limiter::RateLimiter;
use crate::storage::memory::EntryStore;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Cadence of the expiry sweep, independent of the TTL itself.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    store: Arc<EntryStore>,
    limiter: Arc<RateLimiter>,
    snapshots: Arc<SnapshotManager>,
    sweep_interval: Duration,
    expire_after: Duration,
    reset_interval: Duration,
    save_interval: Duration,
}

impl Scheduler {
    pub fn new(
        config: &Config,
        store: Arc<EntryStore>,
        limiter: Arc<RateLimiter>,
        snapshots: Arc<SnapshotManager>,
    ) -> Arc<Self> {
        Self::with_sweep_interval(config, store, limiter, snapshots, SWEEP_INTERVAL)
    }

    /// Same as `new`, with a custom sweep cadence.
    pub fn with_sweep_interval(
        config: &Config,
        store: Arc<EntryStore>,
        limiter: Arc<RateLimiter>,
        snapshots: Arc<SnapshotManager>,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            limiter,
            snapshots,
            sweep_interval,
            expire_after: config.expire_duration,
            reset_interval: config.reset_duration,
            save_interval: config.save_duration,
        })
    }

    /// Spawns the three maintenance loops and returns immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweep_handle = {
            let scheduler = self.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                scheduler.sweep_loop(shutdown).await;
            })
        };

        let reset_handle = {
            let scheduler = self.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                scheduler.reset_loop(shutdown).await;
            })
        };

        let flush_handle = {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.flush_loop(shutdown_rx).await;
            })
        };

        tracing::info!(
            "Background tasks started (sweep every {:?}, reset every {:?}, save every {:?})",
            self.sweep_interval,
            self.reset_interval,
            self.save_interval
        );

        SchedulerHandle {
            scheduler: self,
            shutdown_tx,
            tasks: vec![sweep_handle, reset_handle, flush_handle],
        }
    }

    /// One expiry pass. Returns the number of removed keys.
    pub fn sweep_once(&self) -> usize {
        let removed = self.store.sweep_expired(Instant::now(), self.expire_after);
        if removed > 0 {
            tracing::info!("Cleaned up {} expired keys", removed);
        }
        removed
    }

    pub fn reset_once(&self) {
        let tracked = self.limiter.reset();
        tracing::trace!(
            "Rate limit window reset to {} tokens ({} clients tracked)",
            self.limiter.max_requests(),
            tracked
        );
    }

    /// One snapshot flush. Failures are logged and otherwise ignored.
    pub async fn flush_once(&self) {
        match self.snapshots.flush(&self.store).await {
            Ok(count) => tracing::debug!("Saved {} keys", count),
            Err(e) => tracing::error!(
                "Failed to save snapshot to {}: {}",
                self.snapshots.path().display(),
                e
            ),
        }
    }

    async fn sweep_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = periodic(self.sweep_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn reset_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = periodic(self.reset_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reset_once();
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    // A flush that has started always runs to completion: shutdown is only
    // observed between ticks.
    async fn flush_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = periodic(self.save_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.flush_once().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

/// Interval whose first tick is one full period away.
fn periodic(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Controls the running maintenance loops.
pub struct SchedulerHandle {
    scheduler: Arc<Scheduler>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops the loops, letting an in-flight flush finish, then writes a final
    /// snapshot. The whole sequence is bounded by `grace`.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        let scheduler = self.scheduler;
        let tasks = self.tasks;

        let drain = async move {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!("Background task ended abnormally: {}", e);
                }
            }
            scheduler.flush_once().await;
        };

        match tokio::time::timeout(grace, drain).await {
            Ok(()) => tracing::info!("Background tasks stopped"),
            Err(_) => tracing::warn!(
                "Final snapshot did not complete within {:?}",
                grace
            ),
        }
    }
}
