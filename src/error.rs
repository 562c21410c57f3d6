//! Error Types
//!
//! Every rejection a request can hit is a `KvError` variant with a stable
//! outcome code. The transport maps these to HTTP statuses; the core itself
//! knows nothing about wire formats.
//!
//! Persistence failures are reported through `PersistenceError` and are never
//! surfaced to request handling: callers log them and carry on.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    #[error("Key is required")]
    EmptyKey,

    #[error("Key too long")]
    KeyTooLong,

    /// Value (and secret, when one was supplied) exceed the configured value size.
    #[error("{}", too_large_message(.secret_supplied))]
    TooLarge { secret_supplied: bool },

    #[error("Only IPv4 is supported")]
    NotIpv4,

    /// `X-Owner-Secret` is not valid UTF-8.
    #[error("Invalid owner secret")]
    InvalidSecret,

    /// The request body could not be read to the end.
    #[error("Error reading body")]
    BodyRead,

    #[error("Rate limit")]
    RateLimited,

    #[error("Forbidden: Incorrect secret")]
    SecretMismatch,

    #[error("Store capacity reached")]
    CapacityExceeded,

    #[error("Key not found")]
    NotFound,
}

impl KvError {
    /// Stable identifier for the outcome, independent of the human message.
    pub fn code(&self) -> &'static str {
        match self {
            KvError::EmptyKey => "empty_key",
            KvError::KeyTooLong => "key_too_long",
            KvError::TooLarge { .. } => "too_large",
            KvError::NotIpv4 => "not_ipv4",
            KvError::InvalidSecret => "invalid_secret",
            KvError::BodyRead => "body_read",
            KvError::RateLimited => "rate_limited",
            KvError::SecretMismatch => "secret_mismatch",
            KvError::CapacityExceeded => "capacity_exceeded",
            KvError::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid base64 value for key {key}: {source}")]
    Base64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn too_large_message(secret_supplied: &bool) -> &'static str {
    if *secret_supplied {
        "Value plus secret too large"
    } else {
        "Value too large"
    }
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("{name} cost ({cost}) exceeds max-requests ({max_requests})")]
    CostExceedsBudget {
        name: &'static str,
        cost: u32,
        max_requests: u32,
    },
}
