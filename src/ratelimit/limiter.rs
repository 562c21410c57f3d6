use super::types::RateDecision;

use dashmap::DashMap;
use std::net::Ipv4Addr;

/// Fixed-window token budget per IPv4 client.
///
/// Absent clients implicitly hold the full `max_requests` budget; a bucket is
/// only materialised once a client spends something.
pub struct RateLimiter {
    buckets: DashMap<Ipv4Addr, u32>,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests,
        }
    }

    /// Spends `cost` tokens for `ip`.
    ///
    /// The bucket's shard lock is held across the check and the update, so
    /// concurrent requests from one client are linearized.
    pub fn consume(&self, ip: Ipv4Addr, cost: u32) -> RateDecision {
        let mut tokens = self.buckets.entry(ip).or_insert(self.max_requests);

        match tokens.checked_sub(cost) {
            Some(remaining) => {
                *tokens = remaining;
                RateDecision::Allowed { remaining }
            }
            None => {
                tracing::debug!(%ip, available = *tokens, cost, "Rate limit hit");
                RateDecision::Limited
            }
        }
    }

    /// Tokens `ip` could still spend in the current window.
    pub fn remaining(&self, ip: Ipv4Addr) -> u32 {
        self.buckets
            .get(&ip)
            .map(|tokens| *tokens)
            .unwrap_or(self.max_requests)
    }

    /// Starts a new window. Returns how many clients were tracked in the old one.
    pub fn reset(&self) -> usize {
        let tracked = self.buckets.len();
        self.buckets.clear();
        tracked
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}
