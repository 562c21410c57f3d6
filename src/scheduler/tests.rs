//! Scheduler Tests
//!
//! The loops run on real (short) intervals; assertions leave generous slack so
//! they do not depend on exact tick timing.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::persistence::snapshot::SnapshotManager;
    use crate::ratelimit::limiter::RateLimiter;
    use crate::scheduler::scheduler::Scheduler;
    use crate::storage::memory::EntryStore;
    use bytes::Bytes;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const CLIENT: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

    struct Fixture {
        _dir: TempDir,
        store: Arc<EntryStore>,
        limiter: Arc<RateLimiter>,
        snapshots: Arc<SnapshotManager>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let snapshots = Arc::new(SnapshotManager::new(dir.path().join("store.json")));
        Fixture {
            _dir: dir,
            store: Arc::new(EntryStore::new(100)),
            limiter: Arc::new(RateLimiter::new(11)),
            snapshots,
        }
    }

    fn scheduler(config: &Config, f: &Fixture, sweep: Duration) -> Arc<Scheduler> {
        Scheduler::with_sweep_interval(
            config,
            f.store.clone(),
            f.limiter.clone(),
            f.snapshots.clone(),
            sweep,
        )
    }

    #[tokio::test]
    async fn test_sweep_once_uses_configured_ttl() {
        let f = fixture();
        let mut config = Config::default();
        config.expire_duration = Duration::ZERO;
        let scheduler = scheduler(&config, &f, Duration::from_secs(60));

        f.store.put("k", Bytes::from_static(b"v"), None).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(scheduler.sweep_once(), 1);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_default_ttl_keeps_fresh_entries() {
        let f = fixture();
        let scheduler = Scheduler::new(
            &Config::default(),
            f.store.clone(),
            f.limiter.clone(),
            f.snapshots.clone(),
        );

        f.store.put("k", Bytes::from_static(b"v"), None).unwrap();

        assert_eq!(scheduler.sweep_once(), 0);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_once_restores_budgets() {
        let f = fixture();
        let scheduler = scheduler(&Config::default(), &f, Duration::from_secs(60));

        f.limiter.consume(CLIENT, 9);
        scheduler.reset_once();

        assert_eq!(f.limiter.remaining(CLIENT), 11);
    }

    #[tokio::test]
    async fn test_loops_run_independently() {
        let f = fixture();
        let mut config = Config::default();
        config.expire_duration = Duration::from_millis(10);
        config.reset_duration = Duration::from_millis(30);
        config.save_duration = Duration::from_millis(40);
        let handle = scheduler(&config, &f, Duration::from_millis(20)).start();

        f.store.put("k", Bytes::from_static(b"v"), None).unwrap();
        f.limiter.consume(CLIENT, 11);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(f.store.is_empty(), "expired key should have been swept");
        assert_eq!(f.limiter.remaining(CLIENT), 11, "window should have reset");
        assert!(f.snapshots.path().exists(), "a periodic flush should have run");

        handle.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_shutdown_writes_final_snapshot() {
        let f = fixture();
        let handle = scheduler(&Config::default(), &f, Duration::from_secs(60)).start();

        f.store
            .put("room", Bytes::from_static(b"peer"), Some("s"))
            .unwrap();
        assert!(!f.snapshots.path().exists());

        handle.shutdown(Duration::from_secs(5)).await;

        let records = f.snapshots.read().unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "room");
        assert_eq!(records[0].secret.as_deref(), Some("s"));
    }

    #[tokio::test]
    async fn test_shutdown_survives_failed_flush() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let store = Arc::new(EntryStore::new(10));
        store.put("k", Bytes::from_static(b"v"), None).unwrap();
        let handle = Scheduler::new(
            &Config::default(),
            store.clone(),
            Arc::new(RateLimiter::new(11)),
            Arc::new(SnapshotManager::new(blocker.join("store.json"))),
        )
        .start();

        handle.shutdown(Duration::from_secs(5)).await;

        assert_eq!(store.len(), 1);
    }
}
