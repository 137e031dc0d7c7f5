//! Shared rate-ledger store.
//!
//! The ledger is a hash mapping each API token to the epoch-millisecond time
//! after which it may be used again, guarded by a single lock key.

mod memory;
mod redis;

pub use memory::MemoryLedgerStore;
pub use redis::{RedisLedgerStore, connect};

use async_trait::async_trait;
use courier_common::AppError;
use std::time::Duration;

/// Ledger store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// A ledger field held something other than an integer timestamp.
    #[error("Invalid value for {key}[{field}]: {value}")]
    InvalidValue {
        key: String,
        field: String,
        value: String,
    },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Redis(err.to_string())
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Primitives the lock and the token bucket need from the shared store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Set `key` to `value` with a TTL unless it already exists.
    /// Returns whether the value was set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Read a plain key.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically delete `key` if it currently holds `expected`.
    /// Returns whether the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Read one hash field as an integer.
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<i64>>;

    /// Write one hash field.
    async fn hash_set(&self, key: &str, field: &str, value: i64) -> StoreResult<()>;

    /// Write one hash field unless it already exists.
    /// Returns whether the field was written.
    async fn hash_set_if_absent(&self, key: &str, field: &str, value: i64) -> StoreResult<bool>;
}

/// Keys used by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerKeys {
    /// Hash of token -> available-at.
    pub bucket: String,
    /// Lock guarding the hash.
    pub lock: String,
}

impl LedgerKeys {
    /// Derive the ledger keys under a prefix.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        let bucket = "token_bucket";
        Self {
            bucket: format!("{prefix}:{bucket}"),
            lock: format!("{prefix}:lock:{bucket}"),
        }
    }
}
