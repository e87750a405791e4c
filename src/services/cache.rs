use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use crate::models::task::CachedFullResult;

const RESULT_KEY_PREFIX: &str = "qc_tool:results:";

/// Key-value store for finished validation results.
///
/// Keys are chosen by callers; implementations keep them apart from any
/// other data sharing the backend.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn put(&self, key: &str, value: &CachedFullResult, ttl: Duration)
        -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<CachedFullResult>, CacheError>;
}

/// Redis-backed result cache storing JSON values with an expiry.
///
/// Every key lives under `qc_tool:results:`, so caller keys can never touch
/// the job queue lists in the same database.
pub struct RedisResultCache {
    client: redis::Client,
}

impl RedisResultCache {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

fn storage_key(key: &str) -> String {
    format!("{RESULT_KEY_PREFIX}{key}")
}

#[async_trait]
impl ResultCache for RedisResultCache {
    async fn put(
        &self,
        key: &str,
        value: &CachedFullResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(value)?;
        // Redis rejects an expiry of zero
        conn.set_ex::<_, _, ()>(storage_key(key), payload, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CachedFullResult>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(storage_key(key)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(CacheError::Serialize))
            .transpose()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
