//! Per-Client Rate Limiting
//!
//! Every request spends tokens from a budget keyed by the client's IPv4 address
//! before it reaches the store. Budgets live for one fixed window: when the
//! window ends the whole table is dropped and every client starts over with
//! `max_requests` tokens.
//!
//! ## Semantics
//! - **Fixed window**: no carryover or smoothing, so a client active at the end
//!   of one window may burst a full budget again right after the reset.
//! - **Atomic rejection**: a request that would overdraw the budget is refused
//!   and leaves the remaining tokens untouched.

pub mod limiter;
pub mod types;
