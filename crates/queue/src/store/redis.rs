//! Redis-backed ledger store.

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, HashesInterface, KeysInterface, LuaInterface};
use fred::types::config::Config as RedisConfig;
use fred::types::{Expiration, SetOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{LedgerStore, StoreError, StoreResult};

/// Deletes KEYS[1] only while it still holds ARGV[1].
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Connect a fred client to the given Redis URL.
pub async fn connect(redis_url: &str) -> StoreResult<Arc<RedisClient>> {
    let config = RedisConfig::from_url(redis_url).map_err(|e| StoreError::Redis(e.to_string()))?;
    let client = RedisClient::new(config, None, None, None);
    client
        .init()
        .await
        .map_err(|e| StoreError::Redis(e.to_string()))?;

    info!("Connected to Redis rate ledger");
    Ok(Arc::new(client))
}

/// Ledger store using Redis.
#[derive(Clone)]
pub struct RedisLedgerStore {
    redis: Arc<RedisClient>,
}

impl RedisLedgerStore {
    /// Create a store over an initialized client.
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

fn redis_err(e: fred::error::Error) -> StoreError {
    StoreError::Redis(e.to_string())
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let result: Option<String> = self
            .redis
            .set(
                key,
                value,
                Some(Expiration::PX(ttl.as_millis() as i64)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(redis_err)?;

        // NX returns None if key already exists, Some("OK") if set
        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.redis.get(key).await.map_err(redis_err)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let deleted: i64 = self
            .redis
            .eval(
                UNLOCK_SCRIPT,
                vec![key.to_string()],
                vec![expected.to_string()],
            )
            .await
            .map_err(redis_err)?;

        Ok(deleted > 0)
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<i64>> {
        let raw: Option<String> = self.redis.hget(key, field).await.map_err(redis_err)?;

        raw.map(|value| {
            value.parse::<i64>().map_err(|_| StoreError::InvalidValue {
                key: key.to_string(),
                field: field.to_string(),
                value,
            })
        })
        .transpose()
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> StoreResult<()> {
        self.redis
            .hset::<(), _, _>(key, (field, value.to_string()))
            .await
            .map_err(redis_err)
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: i64) -> StoreResult<bool> {
        let written: i64 = self
            .redis
            .hsetnx(key, field, value.to_string())
            .await
            .map_err(redis_err)?;

        Ok(written == 1)
    }
}
