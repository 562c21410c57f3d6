//! Entry Storage
//!
//! Implements the single-node, in-memory key-value map behind the service.
//!
//! ## Core Concepts
//! - **Sharded locking**: `EntryStore` sits on a `DashMap`, so reads and writes to
//!   unrelated keys only contend when they land on the same shard.
//! - **Per-key linearization**: a write authorizes and mutates under the key's
//!   shard lock; concurrent writers to one key observe a total order.
//! - **Capacity**: enforced on insert only, through slot reservation on an
//!   atomic counter. Updates to existing keys never hit the limit.
//! - **Expiry**: entries untouched for longer than the TTL are removed by a
//!   periodic sweep, never on the request path.

pub mod memory;
pub mod types;
