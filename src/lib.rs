//! Rendezvous Key-Value Store Library
//!
//! An ephemeral, public key-value store that distributed peers use to find
//! each other. This crate holds the whole engine; the binary (`main.rs`) only
//! parses flags, wires the components together and serves them over HTTP.
//!
//! ## Architecture Modules
//! - **`storage`**: The sharded in-memory entry store. Owns the capacity and
//!   expiry invariants and linearizes writes per key.
//! - **`ratelimit`**: Fixed-window, cost-weighted request budgets per IPv4 client.
//! - **`authorizer`**: Pure write rules: owner secrets, size limits, and the
//!   `ip/` key namespace.
//! - **`persistence`**: Crash-safe JSON snapshots of the store (temp file, fsync,
//!   rename), loaded at startup.
//! - **`scheduler`**: The three background loops (expiry sweep, budget reset,
//!   snapshot flush) and the shutdown sequence.
//! - **`service`**: The request pipeline (`KvService`) and its axum transport.
//! - **`config`** / **`error`**: Command-line configuration and error types.

pub mod authorizer;
pub mod config;
pub mod error;
pub mod persistence;
pub mod ratelimit;
pub mod scheduler;
pub mod service;
pub mod storage;
