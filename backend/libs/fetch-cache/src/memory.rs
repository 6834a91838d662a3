//! Process-local cache store

use crate::error::CacheResult;
use crate::metrics::CacheMetrics;
use crate::{CacheEntry, CacheLookup, CacheStore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// In-memory [`CacheStore`] backed by a concurrent map.
///
/// Entries are never evicted; TTL only decides staleness.
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<DashMap<String, Arc<CacheEntry>>>,
    metrics: CacheMetrics,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed entry, keeping its original write time
    pub fn insert_entry(&self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), Arc::new(entry));
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.as_ref().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<CacheLookup> {
        // Clone the Arc out so the shard lock is released before building the result
        let entry = self.entries.get(key).map(|entry| Arc::clone(entry.value()));

        match entry {
            Some(entry) => {
                let lookup = CacheLookup::from_entry(&entry);
                let stale = matches!(lookup, CacheLookup::Found { is_stale: true, .. });
                debug!(key = %key, stale, "Cache hit");
                self.metrics.record_hit(key, stale);
                Ok(lookup)
            }
            None => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                Ok(CacheLookup::NotFound)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.entries
            .insert(key.to_string(), Arc::new(CacheEntry::new(value, ttl)));
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache set");
        self.metrics.record_write(key);
        Ok(())
    }
}
