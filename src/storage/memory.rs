use super::types::{Entry, PutOutcome};
use crate::authorizer::rules::{WriteDecision, authorize_write};
use crate::error::KvError;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as Slot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct EntryStore {
    entries: DashMap<String, Entry>,
    /// Number of occupied (or reserved) slots; authoritative for capacity.
    len: AtomicUsize,
    max_entries: usize,
}

impl EntryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            len: AtomicUsize::new(0),
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn get_value(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: &str, value: Bytes, secret: Option<&str>) -> Result<PutOutcome, KvError> {
        self.put_at(key, value, secret, Instant::now())
    }

    /// Writes `value` under `key` as of `now`.
    ///
    /// Authorization runs against the entry as it exists under the shard lock,
    /// so no other writer can slip in between the check and the mutation.
    pub fn put_at(
        &self,
        key: &str,
        value: Bytes,
        secret: Option<&str>,
        now: Instant,
    ) -> Result<PutOutcome, KvError> {
        match self.entries.entry(key.to_owned()) {
            Slot::Occupied(mut occupied) => match authorize_write(Some(occupied.get()), secret) {
                WriteDecision::Update { claim } => {
                    let entry = occupied.get_mut();
                    entry.value = value;
                    entry.last_update = now;
                    if claim {
                        entry.owner_secret = secret.map(str::to_owned);
                        Ok(PutOutcome::Claimed)
                    } else {
                        Ok(PutOutcome::Updated)
                    }
                }
                // Insert is only ever decided for absent entries
                WriteDecision::Deny | WriteDecision::Insert => Err(KvError::SecretMismatch),
            },
            Slot::Vacant(vacant) => {
                if !self.reserve_slot() {
                    return Err(KvError::CapacityExceeded);
                }
                vacant.insert(Entry {
                    value,
                    owner_secret: secret.map(str::to_owned),
                    last_update: now,
                });
                Ok(PutOutcome::Inserted)
            }
        }
    }

    /// Inserts a record recovered from a snapshot, bypassing authorization.
    /// Capacity still applies.
    pub fn restore(
        &self,
        key: String,
        value: Bytes,
        owner_secret: Option<String>,
        now: Instant,
    ) -> Result<(), KvError> {
        let entry = Entry {
            value,
            owner_secret,
            last_update: now,
        };
        match self.entries.entry(key) {
            Slot::Occupied(mut occupied) => {
                occupied.insert(entry);
            }
            Slot::Vacant(vacant) => {
                if !self.reserve_slot() {
                    return Err(KvError::CapacityExceeded);
                }
                vacant.insert(entry);
            }
        }
        Ok(())
    }

    /// Removes every entry with `now - last_update > ttl` and returns how many
    /// were dropped. Shards are locked one at a time.
    pub fn sweep_expired(&self, now: Instant, ttl: Duration) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.last_update) <= ttl;
            if !keep {
                removed += 1;
                self.len.fetch_sub(1, Ordering::AcqRel);
            }
            keep
        });
        removed
    }

    /// Visits every live entry. The visitor runs under a shard read lock and must
    /// not call back into the store.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &Entry),
    {
        for item in self.entries.iter() {
            visitor(item.key(), item.value());
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn reserve_slot(&self) -> bool {
        self.len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_entries).then_some(n + 1)
            })
            .is_ok()
    }
}
