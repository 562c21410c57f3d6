//! Snapshot Persistence
//!
//! Keeps a best-effort durable copy of the entry store on disk.
//!
//! ## Lifecycle
//! - **Startup**: the snapshot is loaded into an empty store. A missing file means
//!   a fresh start; an unreadable one is logged and ignored.
//! - **Flush**: the live store is captured, encoded and written through
//!   `atomic::write_atomic`, so readers only ever see a complete snapshot.
//! - **Failure**: flush errors are returned to the caller for logging. The
//!   previous snapshot and the in-memory store are left as they were.
//!
//! Timestamps are not persisted; every loaded entry starts a fresh TTL.

pub mod atomic;
pub mod snapshot;

#[cfg(test)]
mod tests;
