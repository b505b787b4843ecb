//! Configuration management for the reservation server.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Engine tuning
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
}

/// Engine tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hold sweeper interval in seconds
    pub sweep_interval: u64,
    /// Per-attempt wait for the per-resource lock, in milliseconds
    pub lock_wait_ms: u64,
    /// Lock acquisition attempts before surfacing a retryable 503
    pub lock_attempts: u32,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("INNKEEP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("INNKEEP_PORT", 8080),
                log_level: env::var("INNKEEP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                metrics_host: env::var("INNKEEP_METRICS_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: env_or("INNKEEP_METRICS_PORT", 9090),
            },
            engine: EngineConfig {
                sweep_interval: env_or("INNKEEP_SWEEP_INTERVAL", 5),
                lock_wait_ms: env_or("INNKEEP_LOCK_WAIT_MS", 500),
                lock_attempts: env_or("INNKEEP_LOCK_ATTEMPTS", 3),
            },
        }
    }
}
