//! Key-Value Service
//!
//! Glues the rate limiter, the authorizer rules and the entry store into the
//! request pipeline, and exposes it over HTTP.
//!
//! ## Pipeline
//! 1. **Validation**: empty or oversized keys are rejected first.
//! 2. **Rate limiting**: the request is charged against the client's budget,
//!    regardless of what happens to it afterwards.
//! 3. **Write path**: size checks, `ip/` key rewriting, then an authorized
//!    store mutation.
//! 4. **Read path**: plain lookup; any key, including other clients' `ip/`
//!    keys, is publicly readable.
//!
//! ## Submodules
//! - **`kv_service`**: transport-independent core (`KvService`).
//! - **`handlers`**: axum router, client address resolution, status mapping.
//! - **`types`**: request/response shapes passed between the two.

pub mod handlers;
pub mod kv_service;
pub mod types;
