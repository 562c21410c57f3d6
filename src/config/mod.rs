//! Runtime Configuration
//!
//! All tunables are exposed as command-line flags. `Config::default()` yields
//! the same values the binary starts with when no flags are given.

use crate::error::ConfigError;
use crate::ratelimit::types::TokenCosts;

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "rendezvous-kv")]
#[command(version, about = "Ephemeral public key-value store for peer rendezvous", long_about = None)]
pub struct Config {
    /// Interface to listen on
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: IpAddr,

    /// Port on which the server listens
    #[arg(short, long, default_value_t = 80)]
    pub port: u16,

    /// Maximum allowed key length in bytes
    #[arg(long, default_value_t = 100)]
    pub max_key_size: usize,

    /// Maximum allowed value size in bytes (the owner secret counts against it)
    #[arg(long, default_value_t = 1000)]
    pub max_value_size: usize,

    /// Maximum number of key-value pairs
    #[arg(long, default_value_t = 100_000)]
    pub max_num_kv: usize,

    /// Duration after which an untouched key expires
    #[arg(long, default_value = "2h", value_parser = humantime::parse_duration)]
    pub expire_duration: Duration,

    /// Duration between resets of the per-IP request budget
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub reset_duration: Duration,

    /// Duration between automatic snapshot flushes
    #[arg(long, default_value = "30m", value_parser = humantime::parse_duration)]
    pub save_duration: Duration,

    /// Request tokens per IP per reset window
    #[arg(long, default_value_t = 11)]
    pub max_requests: u32,

    /// Tokens charged for a POST
    #[arg(long, default_value_t = 3)]
    pub post_cost: u32,

    /// Tokens charged for a GET
    #[arg(long, default_value_t = 1)]
    pub get_cost: u32,

    /// Snapshot file location
    #[arg(long, default_value = "store.json")]
    pub snapshot_path: PathBuf,

    /// How long shutdown waits for the final snapshot flush
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub shutdown_grace: Duration,

    /// Disable warnings about requests arriving from localhost
    #[arg(long)]
    pub disable_local_ip_warning: bool,

    /// Log level filter (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    pub fn token_costs(&self) -> TokenCosts {
        TokenCosts {
            post: self.post_cost,
            get: self.get_cost,
        }
    }

    /// Rejects values that would stall a background loop or make a request
    /// kind permanently unservable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reset_duration.is_zero() {
            return Err(ConfigError::ZeroPeriod("reset-duration"));
        }
        if self.save_duration.is_zero() {
            return Err(ConfigError::ZeroPeriod("save-duration"));
        }
        if self.max_key_size == 0 {
            return Err(ConfigError::ZeroLimit("max-key-size"));
        }
        if self.max_num_kv == 0 {
            return Err(ConfigError::ZeroLimit("max-num-kv"));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroLimit("max-requests"));
        }
        for (name, cost) in [("post", self.post_cost), ("get", self.get_cost)] {
            if cost > self.max_requests {
                return Err(ConfigError::CostExceedsBudget {
                    name,
                    cost,
                    max_requests: self.max_requests,
                });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["rendezvous-kv"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_public_configuration() {
        let config = Config::default();

        assert_eq!(config.max_key_size, 100);
        assert_eq!(config.max_value_size, 1000);
        assert_eq!(config.max_num_kv, 100_000);
        assert_eq!(config.expire_duration, Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.reset_duration, Duration::from_secs(60));
        assert_eq!(config.save_duration, Duration::from_secs(30 * 60));
        assert_eq!(config.max_requests, 11);
        assert_eq!(config.token_costs(), TokenCosts { post: 3, get: 1 });
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:80");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_parse_human_durations() {
        let config = Config::parse_from([
            "rendezvous-kv",
            "--expire-duration",
            "90s",
            "--reset-duration",
            "5m",
            "--max-num-kv",
            "2",
            "-l",
            "127.0.0.1",
            "-p",
            "8080",
        ]);

        assert_eq!(config.expire_duration, Duration::from_secs(90));
        assert_eq!(config.reset_duration, Duration::from_secs(300));
        assert_eq!(config.max_num_kv, 2);
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let config = Config::parse_from(["rendezvous-kv", "--save-duration", "0s"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod("save-duration"))
        );
    }

    #[test]
    fn test_validate_rejects_cost_above_budget() {
        let config = Config::parse_from(["rendezvous-kv", "--max-requests", "2"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CostExceedsBudget {
                name: "post",
                cost: 3,
                max_requests: 2,
            })
        );
    }
}
