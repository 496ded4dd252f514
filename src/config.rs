use std::env;
use std::time::Duration;

use crate::error::{IndexerError, Result};

// Configuration for the ledger ingestion pipeline
#[derive(Clone, Debug)]
pub struct Config {
    pub redis_url: String, // Index store connection URL
    pub rpc_url: String, // Ledger JSON-RPC endpoint
    pub workers: usize, // Number of concurrent block workers
    pub batch_limit: usize, // Max pending blocks enumerated per dispatcher cycle
    pub rpc_timeout: Duration, // Timeout applied to each ledger call
    pub store_timeout: Duration, // Timeout applied to each store call
    pub idle_poll_interval: Duration, // Pause after a cycle that found no work
    pub metrics_addr: String, // Address for the Prometheus metrics server
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            workers: 10,
            batch_limit: 1000,
            rpc_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(10),
            idle_poll_interval: Duration::from_millis(1000),
            metrics_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Config {
    // Loads configuration from environment variables, with defaults for optional fields
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        let config = Config {
            // Required: index store URL
            redis_url: lookup("REDIS_URL").unwrap_or_default(),
            // Required: ledger RPC URL
            rpc_url: lookup("JSON_RPC_API_URL").unwrap_or_default(),
            workers: parse_or("WORKERS", defaults.workers as u64) as usize,
            batch_limit: parse_or("BATCH_LIMIT", defaults.batch_limit as u64) as usize,
            rpc_timeout: Duration::from_secs(parse_or("RPC_TIMEOUT_SECS", 10)),
            store_timeout: Duration::from_secs(parse_or("STORE_TIMEOUT_SECS", 10)),
            idle_poll_interval: Duration::from_millis(parse_or("IDLE_POLL_MS", 1000)),
            metrics_addr: lookup("METRICS_ADDR").unwrap_or(defaults.metrics_addr),
        };

        if config.redis_url.is_empty() || config.rpc_url.is_empty() {
            return Err(IndexerError::Config(
                "REDIS_URL and JSON_RPC_API_URL must be set".to_string(),
            ));
        }
        if config.workers == 0 || config.batch_limit == 0 {
            return Err(IndexerError::Config(
                "WORKERS and BATCH_LIMIT must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}
