//! Distributed lock over the shared store.
//!
//! A holder owns the lock while the lock key contains its holder id. Release
//! is an atomic compare-and-delete, so a holder whose TTL lapsed cannot remove
//! a lock that has since been taken by someone else.

use courier_common::IdGenerator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::retry::BackoffPolicy;
use crate::store::LedgerStore;

/// Short-lived mutual exclusion keyed on a single store key.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn LedgerStore>,
    key: String,
    ttl: Duration,
    backoff: BackoffPolicy,
    id_gen: IdGenerator,
}

impl DistributedLock {
    /// Create a lock on `key` with default TTL and backoff for [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        key: impl Into<String>,
        ttl: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            backoff,
            id_gen: IdGenerator::new(),
        }
    }

    /// Lock key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Acquire with the configured TTL and backoff.
    pub async fn acquire(&self) -> Option<String> {
        self.acquire_with(self.ttl, &self.backoff).await
    }

    /// Try to take the lock, retrying with exponential backoff.
    ///
    /// Returns the holder id on success and `None` once the retries are
    /// exhausted or the store cannot be reached.
    pub async fn acquire_with(&self, ttl: Duration, backoff: &BackoffPolicy) -> Option<String> {
        let holder_id = self.id_gen.generate_holder_id();

        if self.try_set(&holder_id, ttl).await? {
            return Some(holder_id);
        }

        for attempt in 1..=backoff.retries {
            let delay = backoff.delay_for_attempt(attempt);
            debug!(
                key = %self.key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Lock attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;

            if self.try_set(&holder_id, ttl).await? {
                return Some(holder_id);
            }
        }

        warn!(key = %self.key, retries = backoff.retries, "Lock acquisition exhausted retries");
        None
    }

    /// `Some(acquired)`, or `None` when the store failed.
    async fn try_set(&self, holder_id: &str, ttl: Duration) -> Option<bool> {
        match self.store.set_if_absent(&self.key, holder_id, ttl).await {
            Ok(acquired) => Some(acquired),
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to acquire lock");
                None
            }
        }
    }

    /// Release the lock if `holder_id` still owns it. Never fails.
    pub async fn release(&self, holder_id: &str) {
        match self.store.compare_and_delete(&self.key, holder_id).await {
            Ok(true) => debug!(key = %self.key, "Lock released"),
            Ok(false) => debug!(key = %self.key, "Lock no longer held by this holder"),
            Err(e) => error!(key = %self.key, error = %e, "Failed to unlock"),
        }
    }
}
