//! API token bucket.
//!
//! Every configured token has a ledger entry holding the epoch-millisecond
//! time from which it may be used again. Granting a token pushes that time
//! forward by the cooldown window. The read-check-write over the ledger runs
//! under the distributed lock so two workers never reserve the same token.

use std::sync::Arc;
use std::time::Duration;

use courier_common::Config;
use tracing::{debug, error, info};

use crate::clock::SharedClock;
use crate::lock::DistributedLock;
use crate::retry::BackoffPolicy;
use crate::store::{LedgerKeys, LedgerStore, StoreError, StoreResult};

/// Token bucket configuration.
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Tokens in scan order.
    pub tokens: Vec<String>,
    /// Cooldown applied to a token each time it is granted.
    pub cooldown: Duration,
    /// Lock time-to-live.
    pub lock_ttl: Duration,
    /// Lock retry schedule.
    pub lock_backoff: BackoffPolicy,
}

impl From<&Config> for TokenBucketConfig {
    fn from(config: &Config) -> Self {
        Self {
            tokens: config.bucket.tokens(),
            cooldown: config.bucket.cooldown(),
            lock_ttl: Duration::from_millis(config.lock.ttl_ms),
            lock_backoff: BackoffPolicy::from(&config.lock),
        }
    }
}

/// Shared, lock-guarded pool of rate-limited API tokens.
#[derive(Clone)]
pub struct TokenBucket {
    store: Arc<dyn LedgerStore>,
    lock: DistributedLock,
    clock: SharedClock,
    bucket_key: String,
    tokens: Vec<String>,
    cooldown: Duration,
}

impl TokenBucket {
    /// Create a bucket over `store` using the keys derived from `keys`.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: SharedClock,
        keys: &LedgerKeys,
        config: TokenBucketConfig,
    ) -> Self {
        let lock = DistributedLock::new(
            store.clone(),
            keys.lock.clone(),
            config.lock_ttl,
            config.lock_backoff,
        );

        Self {
            store,
            lock,
            clock,
            bucket_key: keys.bucket.clone(),
            tokens: config.tokens,
            cooldown: config.cooldown,
        }
    }

    /// Create ledger entries for tokens that have none yet.
    ///
    /// Existing entries are left untouched, so restarting a process never
    /// resets a cooldown. Returns the number of entries created.
    pub async fn initialize(&self) -> StoreResult<usize> {
        let mut created = 0;

        for token in &self.tokens {
            let now = self.clock.now_ms();

            if self
                .store
                .hash_set_if_absent(&self.bucket_key, token, now)
                .await?
            {
                debug!(token = %token, available_at = now, "Token initialized");
                created += 1;
            } else {
                debug!(token = %token, "Token already exists, skipping");
            }
        }

        info!(
            tokens = self.tokens.len(),
            created, "Token bucket initialized"
        );
        Ok(created)
    }

    /// Reserve the first token whose cooldown has elapsed.
    ///
    /// Returns `None` when every token is cooling down, when the lock could
    /// not be acquired or when the store failed. A token whose ledger entry
    /// is not an integer is skipped. The lock is released on every path.
    pub async fn get_available_token(&self) -> Option<String> {
        let Some(holder_id) = self.lock.acquire().await else {
            error!("Failed to acquire lock for token bucket");
            return None;
        };

        let reserved = self.reserve_first_available().await;
        self.lock.release(&holder_id).await;

        match reserved {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Error acquiring token");
                None
            }
        }
    }

    async fn reserve_first_available(&self) -> StoreResult<Option<String>> {
        let cooldown_ms = self.cooldown.as_millis() as i64;

        for token in &self.tokens {
            let available_at = match self.store.hash_get(&self.bucket_key, token).await {
                Ok(at) => at,
                Err(e @ StoreError::InvalidValue { .. }) => {
                    error!(token = %token, error = %e, "Skipping token with corrupt ledger entry");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let now = self.clock.now_ms();

            if available_at.is_none_or(|at| now >= at) {
                let next = now.saturating_add(cooldown_ms);
                self.store.hash_set(&self.bucket_key, token, next).await?;

                debug!(token = %token, available_at = next, "Token reserved");
                return Ok(Some(token.clone()));
            }
        }

        Ok(None)
    }

    /// Per-use cooldown window.
    #[must_use]
    pub const fn cooldown_window(&self) -> Duration {
        self.cooldown
    }

    /// Configured tokens in scan order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Ledger timestamp of a token, if it has an entry.
    pub async fn available_at(&self, token: &str) -> StoreResult<Option<i64>> {
        self.store.hash_get(&self.bucket_key, token).await
    }
}
