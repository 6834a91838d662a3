//! Redis-backed cache store shared across processes

use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::{CacheEntry, CacheLookup, CacheStore};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

/// [`CacheStore`] that keeps entries as JSON documents in Redis.
///
/// Staleness comes from the stored timestamp, not from Redis expiry. A
/// `retention` can be set so abandoned keys are eventually reclaimed; it
/// should be well beyond the TTL or stale fallbacks disappear early.
#[derive(Clone)]
pub struct RedisCacheStore {
    redis: SharedRedis,
    retention: Option<Duration>,
    metrics: CacheMetrics,
}

impl RedisCacheStore {
    pub fn new(redis: SharedRedis) -> Self {
        Self {
            redis,
            retention: None,
            metrics: CacheMetrics::new(),
        }
    }

    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    fn decode(key: &str, data: &str) -> CacheResult<CacheEntry> {
        serde_json::from_str(data).map_err(|e| {
            CacheError::InvalidData(format!("undecodable cache entry for {}: {}", key, e))
        })
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<CacheLookup> {
        let data: Option<String> = {
            let mut conn = self.redis.lock().await;
            conn.get(key).await.map_err(|e| {
                self.metrics.record_error(key, "redis");
                CacheError::Redis(e)
            })?
        };

        let Some(data) = data else {
            debug!(key = %key, "Cache miss");
            self.metrics.record_miss(key);
            return Ok(CacheLookup::NotFound);
        };

        match Self::decode(key, &data) {
            Ok(entry) => {
                let lookup = CacheLookup::from_entry(&entry);
                let stale = matches!(lookup, CacheLookup::Found { is_stale: true, .. });
                debug!(key = %key, stale, "Cache hit");
                self.metrics.record_hit(key, stale);
                Ok(lookup)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache entry deserialization failed");
                self.metrics.record_error(key, "deserialize");
                Err(e)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let data = serde_json::to_string(&CacheEntry::new(value, ttl))?;
        let mut conn = self.redis.lock().await;

        let result = match self.retention {
            Some(retention) => {
                conn.set_ex::<_, _, ()>(key, data, retention.as_secs().max(1))
                    .await
            }
            None => conn.set::<_, _, ()>(key, data).await,
        };

        result.map_err(|e| {
            self.metrics.record_error(key, "redis");
            CacheError::Redis(e)
        })?;

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache set");
        self.metrics.record_write(key);
        Ok(())
    }
}
