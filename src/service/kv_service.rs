use super::types::{KvRequest, KvResponse, WRITE_ACK};
use crate::authorizer::rules::{
    allowed_value_size, check_sizes, is_ip_scoped, normalize_secret, rewrite_ip_scoped_key,
    validate_key,
};
use crate::config::Config;
use crate::error::KvError;
use crate::ratelimit::limiter::RateLimiter;
use crate::ratelimit::types::{Operation, RateDecision, TokenCosts};
use crate::storage::memory::EntryStore;
use crate::storage::types::PutOutcome;

use bytes::Bytes;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// The core contract consumed by the transport.
///
/// The store and the limiter are separate components with separate locks; no
/// method here ever holds both at once.
pub struct KvService {
    store: Arc<EntryStore>,
    limiter: Arc<RateLimiter>,
    costs: TokenCosts,
    max_key_size: usize,
    max_value_size: usize,
}

impl KvService {
    pub fn new(config: &Config, store: Arc<EntryStore>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            costs: config.token_costs(),
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
        }
    }

    /// Builds a service with a fresh, empty store and limiter.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(EntryStore::new(config.max_num_kv)),
            Arc::new(RateLimiter::new(config.max_requests)),
        )
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Runs one request through the whole pipeline: key validation, rate
    /// limiting, then the read or write itself.
    pub fn handle_request(&self, req: KvRequest<'_>) -> Result<KvResponse, KvError> {
        self.validate_key(req.key)?;
        self.admit(req.client_ip, req.op)?;

        match req.op {
            Operation::Read => self
                .handle_read(req.key)
                .map(KvResponse::Value)
                .ok_or(KvError::NotFound),
            Operation::Write => self
                .handle_write(req.key, req.body, req.secret, req.client_ip)
                .map(KvResponse::Written),
        }
    }

    pub fn validate_key(&self, key: &str) -> Result<(), KvError> {
        validate_key(key, self.max_key_size)
    }

    pub fn check_rate(&self, client_ip: Ipv4Addr, cost: u32) -> RateDecision {
        self.limiter.consume(client_ip, cost)
    }

    /// Charges `op` to the client's budget.
    pub fn admit(&self, client_ip: Ipv4Addr, op: Operation) -> Result<(), KvError> {
        match self.check_rate(client_ip, self.costs.cost_of(op)) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited => Err(KvError::RateLimited),
        }
    }

    /// Largest body a write with `secret` may carry. Transports read at most
    /// one byte past this before rejecting the request.
    pub fn value_limit(&self, secret: Option<&str>) -> Result<usize, KvError> {
        allowed_value_size(normalize_secret(secret), self.max_value_size)
    }

    pub fn handle_read(&self, key: &str) -> Option<Bytes> {
        self.store.get_value(key)
    }

    /// Stores `body` under `raw_key` (rewritten first if it is an `ip/` key).
    ///
    /// Returns the response payload: the client's address for `ip/` keys,
    /// `OK` otherwise.
    pub fn handle_write(
        &self,
        raw_key: &str,
        body: Bytes,
        secret: Option<&str>,
        client_ip: Ipv4Addr,
    ) -> Result<String, KvError> {
        let secret = normalize_secret(secret);
        check_sizes(body.len(), secret, self.max_value_size)?;

        let client_ip_text = client_ip.to_string();
        let key = rewrite_ip_scoped_key(raw_key, &client_ip_text);

        match self.store.put(&key, body, secret) {
            Ok(PutOutcome::Claimed) => {
                tracing::debug!(key = %key, client = %client_ip, "Key claimed");
            }
            Ok(outcome) => {
                tracing::trace!(key = %key, ?outcome, "Key written");
            }
            Err(e) => {
                tracing::debug!(key = %key, client = %client_ip, code = e.code(), "Write rejected");
                return Err(e);
            }
        }

        if is_ip_scoped(&key) {
            Ok(client_ip_text)
        } else {
            Ok(WRITE_ACK.to_string())
        }
    }

    pub fn rewrite_ip_scoped_key(&self, raw_key: &str, client_ip_text: &str) -> String {
        rewrite_ip_scoped_key(raw_key, client_ip_text)
    }
}
