use bytes::Bytes;
use std::time::Instant;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Opaque value bytes.
    pub value: Bytes,
    /// Set at most once, by the first write that supplies a secret. Never cleared.
    pub owner_secret: Option<String>,
    /// Time of the most recent successful write (or of the snapshot load).
    pub last_update: Instant,
}

impl Entry {
    pub fn is_claimed(&self) -> bool {
        self.owner_secret.is_some()
    }
}

/// Successful result of `EntryStore::put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Updated,
    /// Updated, and the supplied secret now owns the key.
    Claimed,
}
