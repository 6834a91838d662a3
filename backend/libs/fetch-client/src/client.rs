//! Fetch orchestrator
//!
//! Per call: breaker gate, bulkhead slot, remote call under a deadline, then
//! either record success and refresh the cache or record failure and fall
//! back to whatever the cache holds (fresh or stale).

use crate::config::{BulkheadRejectionPolicy, ClientConfig};
use crate::decode::PayloadDecoder;
use crate::error::{CallFailure, FetchError, TransportError};
use crate::transport::Transport;
use fetch_cache::{CacheKey, CacheLookup, CacheStore};
use resilience::{
    with_timeout, Bulkhead, BulkheadStats, CircuitBreaker, CircuitBreakerSnapshot, CircuitState,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a fetched value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    Remote,
    /// Served by the fallback path; `cause` is why the live call was skipped or failed
    Cache { stale: bool, cause: CallFailure },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: FetchSource,
}

/// Resilient client for one remote resource.
///
/// Breaker and bulkhead state belong to this instance; clones of the handles
/// are not shared with other clients.
pub struct ResilientClient<D: PayloadDecoder> {
    config: ClientConfig,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn CacheStore>,
    keys: CacheKey,
    decoder: D,
}

impl<D: PayloadDecoder> ResilientClient<D> {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
        decoder: D,
    ) -> Self {
        let breaker = CircuitBreaker::named(config.name.clone(), config.circuit_breaker_config());
        let bulkhead = Bulkhead::named(config.name.clone(), config.bulkhead_config());
        let keys = CacheKey::new(config.cache_namespace.clone());

        info!(
            client = %config.name,
            failure_threshold = config.failure_threshold,
            max_concurrency = config.max_concurrency,
            max_queue_depth = config.max_queue_depth,
            "Resilient client created"
        );

        Self {
            config,
            breaker,
            bulkhead,
            transport,
            cache,
            keys,
            decoder,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn circuit_snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    pub fn bulkhead_stats(&self) -> BulkheadStats {
        self.bulkhead.stats()
    }

    /// Cache key used for `key`
    pub fn cache_key(&self, key: &str) -> String {
        self.keys.for_id(key)
    }

    /// Fetch the value for `key`, live if possible, otherwise from cache
    pub async fn fetch(&self, key: &str) -> Result<D::Output, FetchError> {
        self.fetch_with_source(key).await.map(|fetched| fetched.value)
    }

    /// Like [`fetch`](Self::fetch) but also reports where the value came from
    pub async fn fetch_with_source(&self, key: &str) -> Result<Fetched<D::Output>, FetchError> {
        let mut permit = match self.breaker.allow_request() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(client = %self.config.name, key = %key, "Circuit open, skipping remote");
                return self.fallback(key, CallFailure::CircuitOpen).await;
            }
        };

        let slot = match self.bulkhead.acquire().await {
            Ok(slot) => slot,
            Err(e) => {
                // Gate rejection: the breaker never hears about it
                drop(permit);
                warn!(client = %self.config.name, key = %key, error = %e, "Bulkhead rejected call");
                return match self.config.bulkhead_rejection {
                    BulkheadRejectionPolicy::Propagate => Err(FetchError::BulkheadRejected(e)),
                    BulkheadRejectionPolicy::Fallback => {
                        self.fallback(key, CallFailure::BulkheadRejected(e)).await
                    }
                };
            }
        };

        permit.mark_in_flight();
        match self.call_remote(key).await {
            Ok((value, raw)) => {
                permit.on_success();
                self.store(key, &raw).await;
                drop(slot);
                Ok(Fetched {
                    value,
                    source: FetchSource::Remote,
                })
            }
            Err(cause) => {
                permit.on_failure();
                drop(slot);
                warn!(client = %self.config.name, key = %key, error = %cause, "Remote call failed");
                self.fallback(key, cause).await
            }
        }
    }

    async fn call_remote(&self, key: &str) -> Result<(D::Output, String), CallFailure> {
        let deadline = self.config.request_timeout;
        let raw = with_timeout(deadline, self.transport.invoke(key))
            .await
            .map_err(|_| CallFailure::Transport(TransportError::Timeout(deadline)))??;

        let value = self.decoder.decode(&raw)?;
        Ok((value, raw))
    }

    async fn store(&self, key: &str, raw: &str) {
        let cache_key = self.keys.for_id(key);
        if let Err(e) = self.cache.set(&cache_key, raw, self.config.cache_ttl).await {
            warn!(client = %self.config.name, key = %cache_key, error = %e, "Cache write failed");
        }
    }

    async fn fallback(&self, key: &str, cause: CallFailure) -> Result<Fetched<D::Output>, FetchError> {
        let cache_key = self.keys.for_id(key);

        let lookup = match self.cache.get(&cache_key).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(client = %self.config.name, key = %cache_key, error = %e, "Cache read failed");
                CacheLookup::NotFound
            }
        };

        if let CacheLookup::Found { value, is_stale, .. } = lookup {
            match self.decoder.decode(&value) {
                Ok(decoded) => {
                    info!(
                        client = %self.config.name,
                        key = %key,
                        stale = is_stale,
                        cause = %cause,
                        "Serving cached value"
                    );
                    return Ok(Fetched {
                        value: decoded,
                        source: FetchSource::Cache {
                            stale: is_stale,
                            cause,
                        },
                    });
                }
                Err(e) => {
                    warn!(client = %self.config.name, key = %cache_key, error = %e, "Cached payload undecodable");
                }
            }
        }

        Err(FetchError::ServiceUnavailable {
            key: key.to_string(),
            cause,
        })
    }
}

impl<D: PayloadDecoder> std::fmt::Debug for ResilientClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("name", &self.config.name)
            .field("breaker", &self.breaker)
            .field("bulkhead", &self.bulkhead)
            .finish()
    }
}
