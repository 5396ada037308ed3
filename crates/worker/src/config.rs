// SPDX-License-Identifier: MIT

//! Worker pool configuration surface, overridable via `WORKER_<UPPER_SNAKE>`
//! environment variables.

use std::env;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Configuration error: an overriding environment variable failed to parse.
#[derive(Debug, Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub pool_size: usize,
    pub batch_size: usize,
    pub event_timeout_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    pub consumer_group: String,
    pub consumer_name: String,
    pub idempotency_ttl_seconds: u64,
    pub stale_claim_idle_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            batch_size: 10,
            event_timeout_seconds: 300,
            shutdown_timeout_seconds: 30,
            consumer_group: "development-handlers".to_string(),
            consumer_name: auto_consumer_name(),
            idempotency_ttl_seconds: 604_800,
            stale_claim_idle_ms: 60_000,
        }
    }
}

impl WorkerPoolConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Overlay `WORKER_<UPPER_SNAKE>` environment variables onto the default
    /// configuration. Reading the process environment is this crate's own
    /// concern; there is no on-disk config file to load.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = env::var("WORKER_POOL_SIZE") {
            config.pool_size = parse(&v, "WORKER_POOL_SIZE")?;
        }
        if let Ok(v) = env::var("WORKER_BATCH_SIZE") {
            config.batch_size = parse(&v, "WORKER_BATCH_SIZE")?;
        }
        if let Ok(v) = env::var("WORKER_EVENT_TIMEOUT_SECONDS") {
            config.event_timeout_seconds = parse(&v, "WORKER_EVENT_TIMEOUT_SECONDS")?;
        }
        if let Ok(v) = env::var("WORKER_SHUTDOWN_TIMEOUT_SECONDS") {
            config.shutdown_timeout_seconds = parse(&v, "WORKER_SHUTDOWN_TIMEOUT_SECONDS")?;
        }
        if let Ok(v) = env::var("WORKER_CONSUMER_GROUP") {
            config.consumer_group = v;
        }
        if let Ok(v) = env::var("WORKER_CONSUMER_NAME") {
            config.consumer_name = v;
        }
        if let Ok(v) = env::var("WORKER_IDEMPOTENCY_TTL_SECONDS") {
            config.idempotency_ttl_seconds = parse(&v, "WORKER_IDEMPOTENCY_TTL_SECONDS")?;
        }
        if let Ok(v) = env::var("WORKER_STALE_CLAIM_IDLE_MS") {
            config.stale_claim_idle_ms = parse(&v, "WORKER_STALE_CLAIM_IDLE_MS")?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(value: &str, var: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError {
        var,
        value: value.to_string(),
    })
}

fn auto_consumer_name() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8).map(|_| format!("{:x}", rng.gen_range(0..16))).collect();
    format!("worker-{suffix}")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
