//! Application configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Token bucket configuration.
    pub bucket: BucketConfig,
    /// Ledger lock configuration.
    #[serde(default)]
    pub lock: LockConfig,
    /// Queue worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Outbound delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Token bucket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketConfig {
    /// API tokens, separated by commas and/or newlines.
    pub api_tokens: String,
    /// Minimum interval between two grants of the same token, in milliseconds.
    pub cooldown_ms: u64,
}

impl BucketConfig {
    /// Configured tokens in their declared order.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        parse_token_list(&self.api_tokens)
    }

    /// Per-use cooldown window.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Ledger lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Lock time-to-live in milliseconds.
    #[serde(default = "default_lock_ttl_ms")]
    pub ttl_ms: u64,
    /// Number of retries after the first failed attempt.
    #[serde(default = "default_lock_retries")]
    pub retries: u32,
    /// Backoff before the first retry, doubled on each further retry.
    #[serde(default = "default_lock_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Upper bound for a single backoff wait.
    #[serde(default = "default_lock_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_lock_ttl_ms(),
            retries: default_lock_retries(),
            base_backoff_ms: default_lock_base_backoff_ms(),
            max_backoff_ms: default_lock_max_backoff_ms(),
        }
    }
}

/// Queue worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Jobs processed concurrently by this process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts before a failing delivery is abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay before a failed delivery is attempted again, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Endpoint messages are posted to. Deliveries are simulated when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Latency of a simulated delivery in milliseconds.
    #[serde(default = "default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,
    /// HTTP timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            simulated_latency_ms: default_simulated_latency_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_redis_prefix() -> String {
    "courier".to_string()
}

const fn default_lock_ttl_ms() -> u64 {
    10_000
}

const fn default_lock_retries() -> u32 {
    4
}

const fn default_lock_base_backoff_ms() -> u64 {
    200
}

const fn default_lock_max_backoff_ms() -> u64 {
    5_000
}

const fn default_concurrency() -> usize {
    4
}

const fn default_max_attempts() -> usize {
    10
}

const fn default_retry_backoff_ms() -> u64 {
    6_000
}

const fn default_simulated_latency_ms() -> u64 {
    2_000
}

const fn default_timeout_ms() -> u64 {
    30_000
}

/// Split a comma and/or newline separated token list.
///
/// Entries are trimmed, empty entries dropped and duplicates removed while
/// keeping the position of their first occurrence.
#[must_use]
pub fn parse_token_list(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for entry in raw.split([',', '\n']) {
        let entry = entry.trim();
        if entry.is_empty() || tokens.iter().any(|t| t == entry) {
            continue;
        }
        tokens.push(entry.to_string());
    }
    tokens
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` file (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `COURIER_ENV`)
    /// 4. Environment variables with `COURIER_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("COURIER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("COURIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.bucket.tokens().is_empty() {
            return Err(AppError::Config(
                "bucket.api_tokens must name at least one token".to_string(),
            ));
        }
        if self.bucket.cooldown_ms == 0 {
            return Err(AppError::Config(
                "bucket.cooldown_ms must be greater than zero".to_string(),
            ));
        }
        if self.lock.ttl_ms == 0 {
            return Err(AppError::Config(
                "lock.ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.worker.max_attempts == 0 {
            return Err(AppError::Config(
                "worker.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::Config(
                "worker.concurrency must be greater than zero".to_string(),
            ));
        }
        if let Some(endpoint) = &self.delivery.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                AppError::Config(format!("delivery.endpoint is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }
}
