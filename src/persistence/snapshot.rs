use super::atomic::write_atomic;
use crate::error::{PersistenceError, PersistenceResult};
use crate::storage::memory::EntryStore;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;

pub const SNAPSHOT_VERSION: u32 = 1;

/// A live entry as captured for the snapshot. No timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub key: String,
    pub value: Bytes,
    pub secret: Option<String>,
}

// --- On-disk format ---

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    entries: Vec<RecordJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordJson {
    key: String,
    /// Standard base64 of the raw value bytes.
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

pub fn encode(records: &[SnapshotRecord]) -> PersistenceResult<Vec<u8>> {
    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        entries: records
            .iter()
            .map(|record| RecordJson {
                key: record.key.clone(),
                value: STANDARD.encode(&record.value),
                secret: record.secret.clone(),
            })
            .collect(),
    };
    Ok(serde_json::to_vec(&file)?)
}

pub fn decode(data: &[u8]) -> PersistenceResult<Vec<SnapshotRecord>> {
    let file: SnapshotFile = serde_json::from_slice(data)?;
    if file.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(file.version));
    }

    file.entries
        .into_iter()
        .map(|item| {
            let value = STANDARD
                .decode(item.value.as_bytes())
                .map_err(|source| PersistenceError::Base64 {
                    key: item.key.clone(),
                    source,
                })?;
            Ok(SnapshotRecord {
                key: item.key,
                value: Bytes::from(value),
                secret: item.secret.filter(|s| !s.is_empty()),
            })
        })
        .collect()
}

/// Copies every live entry out of the store. Values are reference-counted, so
/// the store's shard locks are only held for the walk itself.
pub fn capture(store: &EntryStore) -> Vec<SnapshotRecord> {
    let mut records = Vec::with_capacity(store.len());
    store.for_each(|key, entry| {
        records.push(SnapshotRecord {
            key: key.to_owned(),
            value: entry.value.clone(),
            secret: entry.owner_secret.clone(),
        });
    });
    records
}

/// Sole owner of the snapshot file.
pub struct SnapshotManager {
    path: PathBuf,
    /// Held for the whole of a flush so flushes never overlap and shutdown can
    /// wait for one in flight.
    flush_lock: Mutex<()>,
}

impl SnapshotManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. `Ok(None)` when no snapshot has been written yet.
    pub fn read(&self) -> PersistenceResult<Option<Vec<SnapshotRecord>>> {
        match std::fs::read(&self.path) {
            Ok(data) => decode(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rehydrates `store` from disk. Never fails: problems are logged and the
    /// store simply starts empty (or partially filled, if capacity runs out).
    pub fn load_into(&self, store: &EntryStore) -> usize {
        let records = match self.read() {
            Ok(Some(records)) => records,
            Ok(None) => {
                tracing::info!("No snapshot at {}, starting empty", self.path.display());
                return 0;
            }
            Err(e) => {
                tracing::error!(
                    "Failed to load snapshot {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                return 0;
            }
        };

        let now = Instant::now();
        let total = records.len();
        let mut restored = 0;
        for record in records {
            if store
                .restore(record.key, record.value, record.secret, now)
                .is_ok()
            {
                restored += 1;
            }
        }

        if restored < total {
            tracing::warn!(
                "Store capacity ({}) reached while loading snapshot, dropped {} of {} keys",
                store.max_entries(),
                total - restored,
                total
            );
        }
        tracing::info!(
            "Loaded {} keys from {}",
            restored,
            self.path.display()
        );
        restored
    }

    /// Writes the current contents of `store` to disk and returns the number of
    /// entries written. Encoding and file I/O run on the blocking pool.
    pub async fn flush(&self, store: &EntryStore) -> PersistenceResult<usize> {
        let _guard = self.flush_lock.lock().await;

        let records = capture(store);
        let count = records.len();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> PersistenceResult<()> {
            let data = encode(&records)?;
            write_atomic(&path, &data)?;
            Ok(())
        })
        .await??;

        tracing::debug!("Flushed {} keys to {}", count, self.path.display());
        Ok(count)
    }
}
