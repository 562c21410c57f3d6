//! Persistence Module Tests
//!
//! ## Test Scopes
//! - **Round-trip**: flush then load reproduces `(key, value, secret)` triples.
//! - **Startup**: missing and corrupt snapshots leave the store empty.
//! - **Atomic writes**: no temporary files survive, failures leave the target alone.

#[cfg(test)]
mod tests {
    use crate::error::PersistenceError;
    use crate::persistence::atomic::write_atomic;
    use crate::persistence::snapshot::*;
    use crate::storage::memory::EntryStore;
    use bytes::Bytes;
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn triples(store: &EntryStore) -> BTreeMap<String, (Bytes, Option<String>)> {
        let mut out = BTreeMap::new();
        store.for_each(|key, entry| {
            out.insert(
                key.to_string(),
                (entry.value.clone(), entry.owner_secret.clone()),
            );
        });
        out
    }

    fn populated_store() -> EntryStore {
        let store = EntryStore::new(100);
        store.put("room/1", Bytes::from_static(b"peer-a"), None).unwrap();
        store
            .put("room/2", Bytes::from_static(b"peer-b"), Some("secret-b"))
            .unwrap();
        store
            .put("ip/203.0.113.7/svc", Bytes::from_static(&[0, 159, 146, 150]), None)
            .unwrap();
        store
    }

    // ============================================================
    // ROUND-TRIP
    // ============================================================

    #[tokio::test]
    async fn test_flush_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path().join("store.json"));
        let source = populated_store();

        let written = manager.flush(&source).await.unwrap();
        assert_eq!(written, 3);

        let before_load = Instant::now();
        let restored = EntryStore::new(100);
        assert_eq!(manager.load_into(&restored), 3);

        assert_eq!(triples(&restored), triples(&source));

        // Timestamps are re-issued at load time
        restored.for_each(|_, entry| assert!(entry.last_update >= before_load));
    }

    #[tokio::test]
    async fn test_loaded_secrets_still_guard_keys() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path().join("store.json"));
        manager.flush(&populated_store()).await.unwrap();

        let restored = EntryStore::new(100);
        manager.load_into(&restored);

        assert!(
            restored
                .put("room/2", Bytes::from_static(b"hijack"), Some("guess"))
                .is_err()
        );
        assert!(
            restored
                .put("room/2", Bytes::from_static(b"moved"), Some("secret-b"))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_reload_restarts_expiry_clock() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path().join("store.json"));

        let source = EntryStore::new(10);
        let t0 = Instant::now();
        source
            .put_at("old", Bytes::from_static(b"v"), None, t0)
            .unwrap();
        manager.flush(&source).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let restored = EntryStore::new(10);
        manager.load_into(&restored);

        let ttl = Duration::from_millis(10);
        let sweep_at = t0 + Duration::from_millis(15);

        // Expired in the source store; survives after reload
        assert_eq!(source.sweep_expired(sweep_at, ttl), 1);
        assert_eq!(restored.sweep_expired(sweep_at, ttl), 0);
        assert!(restored.get("old").unwrap().last_update > t0);
    }

    #[tokio::test]
    async fn test_flush_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path().join("store.json"));
        let store = EntryStore::new(10);

        store.put("a", Bytes::from_static(b"1"), None).unwrap();
        manager.flush(&store).await.unwrap();
        store.put("a", Bytes::from_static(b"2"), None).unwrap();
        store.put("b", Bytes::from_static(b"3"), None).unwrap();
        manager.flush(&store).await.unwrap();

        let records = manager.read().unwrap().unwrap();
        assert_eq!(records.len(), 2);
        let a = records.iter().find(|r| r.key == "a").unwrap();
        assert_eq!(a.value, Bytes::from_static(b"2"));

        // Only the snapshot itself is left in the directory
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["store.json".to_string()]);
    }

    #[test]
    fn test_snapshot_format_omits_absent_secret() {
        let records = vec![
            SnapshotRecord {
                key: "open".to_string(),
                value: Bytes::from_static(b"hi"),
                secret: None,
            },
            SnapshotRecord {
                key: "owned".to_string(),
                value: Bytes::from_static(b"yo"),
                secret: Some("s".to_string()),
            },
        ];

        let json: serde_json::Value = serde_json::from_slice(&encode(&records).unwrap()).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["entries"][0]["value"], "aGk=");
        assert!(json["entries"][0].get("secret").is_none());
        assert_eq!(json["entries"][1]["secret"], "s");
        assert_eq!(decode(&encode(&records).unwrap()).unwrap(), records);
    }

    // ============================================================
    // STARTUP FAILURES
    // ============================================================

    #[test]
    fn test_missing_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path().join("absent.json"));
        let store = EntryStore::new(10);

        assert!(manager.read().unwrap().is_none());
        assert_eq!(manager.load_into(&store), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{\"version\": 1, \"entries\": [trunc").unwrap();
        let manager = SnapshotManager::new(&path);
        let store = EntryStore::new(10);

        assert!(matches!(manager.read(), Err(PersistenceError::Serde(_))));
        assert_eq!(manager.load_into(&store), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let data = br#"{"version": 7, "entries": []}"#;

        assert!(matches!(
            decode(data),
            Err(PersistenceError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_bad_base64_names_the_key() {
        let data = br#"{"version": 1, "entries": [{"key": "k", "value": "!!"}]}"#;

        match decode(data) {
            Err(PersistenceError::Base64 { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected base64 error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_respects_capacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let records: Vec<_> = (0..5)
            .map(|i| SnapshotRecord {
                key: format!("k{}", i),
                value: Bytes::from_static(b"v"),
                secret: None,
            })
            .collect();
        std::fs::write(&path, encode(&records).unwrap()).unwrap();

        let store = EntryStore::new(3);
        assert_eq!(SnapshotManager::new(&path).load_into(&store), 3);
        assert_eq!(store.len(), 3);
    }

    // ============================================================
    // ATOMIC WRITES
    // ============================================================

    #[test]
    fn test_write_atomic_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/store.json");

        write_atomic(&path, b"payload").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_failed_flush_is_reported_and_store_kept() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let manager = SnapshotManager::new(blocker.join("store.json"));
        let store = populated_store();

        assert!(manager.flush(&store).await.is_err());

        assert_eq!(store.len(), 3);
        assert_eq!(std::fs::read(&blocker).unwrap(), b"file");
    }
}
