//! Background Maintenance
//!
//! Runs the three periodic jobs that keep the service healthy:
//!
//! - **Expiry sweep** (every minute): drops entries older than the TTL.
//! - **Rate-limit reset** (`reset_duration`): starts a new budget window.
//! - **Snapshot flush** (`save_duration`): writes the store to disk.
//!
//! Each job owns its own tokio task and interval and only touches the component
//! it maintains, so a slow flush never delays a sweep or a reset.

pub mod scheduler;

#[cfg(test)]
mod tests;
