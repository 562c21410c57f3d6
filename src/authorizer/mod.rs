//! Write Authorization
//!
//! Pure decision logic consulted before the store is mutated. Nothing in here
//! holds state or locks; the store calls `authorize_write` from inside its own
//! per-key critical section.
//!
//! ## Rules
//! - **Ownership**: the first non-empty secret written to a key claims it for
//!   good. Claimed keys only accept writes carrying the same secret.
//! - **Sizes**: the secret counts against the value budget.
//! - **IP scoping**: POSTs under `ip/` get the writer's own address embedded in
//!   the key, so nobody can publish under somebody else's address.

pub mod rules;
