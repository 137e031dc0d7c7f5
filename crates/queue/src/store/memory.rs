//! In-process ledger store.
//!
//! Mirrors the Redis semantics closely enough to run many workers inside one
//! process: key TTLs are checked against the injected clock on every access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{LedgerStore, StoreResult};
use crate::clock::SharedClock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: i64,
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Entry>,
    hashes: HashMap<String, HashMap<String, i64>>,
}

impl State {
    fn live(&mut self, key: &str, now: i64) -> Option<&Entry> {
        if self.keys.get(key).is_some_and(|e| e.expires_at <= now) {
            self.keys.remove(key);
        }
        self.keys.get(key)
    }
}

/// Ledger store held in memory.
#[derive(Debug, Clone)]
pub struct MemoryLedgerStore {
    clock: SharedClock,
    state: Arc<RwLock<State>>,
}

impl MemoryLedgerStore {
    /// Create an empty store reading time from `clock`.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;

        if state.live(key, now).is_some() {
            return Ok(false);
        }

        state.keys.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now.saturating_add(ttl.as_millis() as i64),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        Ok(state.live(key, now).map(|e| e.value.clone()))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;

        if state.live(key, now).is_some_and(|e| e.value == expected) {
            state.keys.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<i64>> {
        let state = self.state.read().await;
        Ok(state.hashes.get(key).and_then(|h| h.get(field)).copied())
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let hash = state.hashes.entry(key.to_string()).or_default();

        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (MemoryLedgerStore, ManualClock) {
        let clock = ManualClock::new(0);
        (MemoryLedgerStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_set_if_absent_respects_existing_key() {
        let (store, _) = store();
        let ttl = Duration::from_secs(10);

        assert!(store.set_if_absent("lock", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_key_expires_after_ttl() {
        let (store, clock) = store();

        store
            .set_if_absent("lock", "a", Duration::from_millis(100))
            .await
            .unwrap();

        clock.advance(Duration::from_millis(99));
        assert!(store.get("lock").await.unwrap().is_some());

        clock.advance(Duration::from_millis(1));
        assert!(store.get("lock").await.unwrap().is_none());
        assert!(
            store
                .set_if_absent("lock", "b", Duration::from_millis(100))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_compare_and_delete_requires_match() {
        let (store, _) = store();
        store
            .set_if_absent("lock", "owner", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!store.compare_and_delete("lock", "intruder").await.unwrap());
        assert!(store.get("lock").await.unwrap().is_some());

        assert!(store.compare_and_delete("lock", "owner").await.unwrap());
        assert!(store.get("lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hash_set_if_absent_keeps_existing_field() {
        let (store, _) = store();

        assert!(store.hash_set_if_absent("bucket", "t", 5).await.unwrap());
        assert!(!store.hash_set_if_absent("bucket", "t", 9).await.unwrap());
        assert_eq!(store.hash_get("bucket", "t").await.unwrap(), Some(5));

        store.hash_set("bucket", "t", 9).await.unwrap();
        assert_eq!(store.hash_get("bucket", "t").await.unwrap(), Some(9));
        assert_eq!(store.hash_get("bucket", "missing").await.unwrap(), None);
    }
}
