//! Fallback cache for the resilient fetch client
//!
//! Stores the last known-good raw payload per key with a freshness window:
//! - TTL marks entries stale, it never deletes them
//! - Stale entries are still returned, flagged, so callers decide what to serve
//! - Absent and stale are distinct outcomes
//! - Whole-entry writes (last write wins, readers never see partial entries)

mod error;
mod keys;
mod memory;
mod metrics;
mod redis_store;

pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, CACHE_VERSION};
pub use memory::InMemoryCacheStore;
pub use metrics::CacheMetrics;
pub use redis_store::{RedisCacheStore, SharedRedis};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default freshness window (seconds)
pub const DEFAULT_TTL_SECS: u64 = 300;

/// One cached payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Raw payload as returned by the remote
    pub value: String,
    pub stored_at: DateTime<Utc>,
    #[serde(rename = "ttl_secs", with = "ttl_secs")]
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Entry with an explicit write time, for seeding and restores
    pub fn stored_at(value: impl Into<String>, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            stored_at,
            ttl,
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) > self.ttl
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}

/// Result of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Found {
        value: String,
        stored_at: DateTime<Utc>,
        is_stale: bool,
    },
    NotFound,
}

impl CacheLookup {
    fn from_entry(entry: &CacheEntry) -> Self {
        CacheLookup::Found {
            value: entry.value.clone(),
            stored_at: entry.stored_at,
            is_stale: entry.is_stale(),
        }
    }
}

/// Key/value capability backing the fallback path.
///
/// Implementations must be safe for concurrent use and swap whole entries.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Read an entry; stale entries are returned with `is_stale = true`
    async fn get(&self, key: &str) -> CacheResult<CacheLookup>;

    /// Overwrite the entry for `key`, stamping it with the current time
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
