/// Integration tests for the fetch orchestrator
///
/// Covers the fallback scenarios end to end with a mocked transport and the
/// in-memory cache store.
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use fetch_cache::{CacheEntry, CacheError, CacheLookup, CacheResult, CacheStore, InMemoryCacheStore};
use fetch_client::{
    BulkheadRejectionPolicy, CallFailure, ClientConfig, FetchError, FetchSource, JsonDecoder,
    ResilientClient, TextDecoder, Transport, TransportError,
};
use futures_util::future::join_all;
use mockall::mock;
use resilience::{BulkheadError, CircuitState};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Remote {}

    #[async_trait]
    impl Transport for Remote {
        async fn invoke(&self, key: &str) -> Result<String, TransportError>;
    }
}

/// Transport that never answers within any reasonable deadline
struct SlowRemote {
    started: AtomicUsize,
    delay: Duration,
}

impl SlowRemote {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait]
impl Transport for SlowRemote {
    async fn invoke(&self, key: &str) -> Result<String, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(format!("late:{}", key))
    }
}

/// Cache store whose every operation fails
struct BrokenCache;

#[async_trait]
impl CacheStore for BrokenCache {
    async fn get(&self, _key: &str) -> CacheResult<CacheLookup> {
        Err(CacheError::InvalidData("backend down".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::InvalidData("backend down".to_string()))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Inventory {
    item: String,
    quantity: u32,
}

fn test_config() -> ClientConfig {
    ClientConfig {
        name: "test".to_string(),
        cache_namespace: "test".to_string(),
        ..ClientConfig::default()
    }
}

fn text_client(
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: Arc<InMemoryCacheStore>,
) -> ResilientClient<TextDecoder> {
    ResilientClient::new(config, transport, cache, TextDecoder)
}

fn stale_entry(value: &str) -> CacheEntry {
    CacheEntry::stored_at(
        value,
        Utc::now() - ChronoDuration::minutes(10),
        Duration::from_secs(300),
    )
}

// ==================== Fallback Scenarios ====================

#[tokio::test]
async fn test_open_breaker_serves_cached_value_without_remote_call() {
    let mut remote = MockRemote::new();
    let mut calls = 0;
    remote
        .expect_invoke()
        .withf(|key| key == "K1")
        .times(6)
        .returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("payload-K1".to_string())
            } else {
                Err(TransportError::Request("connection reset".to_string()))
            }
        });

    let cache = Arc::new(InMemoryCacheStore::new());
    let client = text_client(test_config(), Arc::new(remote), cache.clone());

    let first = client.fetch_with_source("K1").await.unwrap();
    assert_eq!(first.source, FetchSource::Remote);
    assert!(matches!(
        cache.get(&client.cache_key("K1")).await.unwrap(),
        CacheLookup::Found { .. }
    ));

    // Five failures, each recovered from cache
    for _ in 0..5 {
        let fetched = client.fetch_with_source("K1").await.unwrap();
        assert_eq!(fetched.value, "payload-K1");
        assert!(matches!(
            fetched.source,
            FetchSource::Cache {
                cause: CallFailure::Transport(_),
                ..
            }
        ));
    }
    assert_eq!(client.circuit_state(), CircuitState::Open);

    // Sixth call: no remote invocation (the mock allows only six)
    let fetched = client.fetch_with_source("K1").await.unwrap();
    assert_eq!(fetched.value, "payload-K1");
    assert_eq!(
        fetched.source,
        FetchSource::Cache {
            stale: false,
            cause: CallFailure::CircuitOpen
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bulkhead_admits_ten_queues_twenty_rejects_one() {
    let remote = SlowRemote::new(Duration::from_secs(10));
    let config = ClientConfig {
        failure_threshold: 100,
        max_concurrency: 10,
        max_queue_depth: 20,
        acquire_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_millis(600),
        ..test_config()
    };
    let client = Arc::new(text_client(
        config,
        remote.clone(),
        Arc::new(InMemoryCacheStore::new()),
    ));

    let handles: Vec<_> = (0..31)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.fetch(&format!("key-{}", i)).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = client.bulkhead_stats();
    assert_eq!(stats.active, 10);
    assert_eq!(stats.queued, 20);
    assert_eq!(remote.started.load(Ordering::SeqCst), 10);

    let mut queue_full = 0;
    let mut timed_out = 0;
    let mut unavailable = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Err(FetchError::BulkheadRejected(BulkheadError::QueueFull { .. })) => queue_full += 1,
            Err(FetchError::BulkheadRejected(BulkheadError::Timeout(_))) => timed_out += 1,
            Err(FetchError::ServiceUnavailable {
                cause: CallFailure::Transport(TransportError::Timeout(_)),
                ..
            }) => unavailable += 1,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(queue_full, 1);
    assert_eq!(timed_out, 20);
    assert_eq!(unavailable, 10);
    assert_eq!(remote.started.load(Ordering::SeqCst), 10);
    assert_eq!(client.bulkhead_stats().active, 0);
}

#[tokio::test]
async fn test_open_breaker_with_empty_cache_is_service_unavailable() {
    let mut remote = MockRemote::new();
    remote
        .expect_invoke()
        .withf(|key| key == "K0")
        .times(1)
        .returning(|_| Err(TransportError::Rejected { status: 500 }));

    let config = ClientConfig {
        failure_threshold: 1,
        ..test_config()
    };
    let client = text_client(config, Arc::new(remote), Arc::new(InMemoryCacheStore::new()));

    assert!(client.fetch("K0").await.is_err());
    assert_eq!(client.circuit_state(), CircuitState::Open);

    let err = client.fetch("K2").await.unwrap_err();
    assert!(err.is_cache_miss());
    match err {
        FetchError::ServiceUnavailable { key, cause } => {
            assert_eq!(key, "K2");
            assert_eq!(cause, CallFailure::CircuitOpen);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_stale_entry_served_while_remote_failing() {
    let mut remote = MockRemote::new();
    remote
        .expect_invoke()
        .times(1)
        .returning(|_| Err(TransportError::Rejected { status: 503 }));

    let cache = Arc::new(InMemoryCacheStore::new());
    let client = text_client(test_config(), Arc::new(remote), cache.clone());
    cache.insert_entry(client.cache_key("K3"), stale_entry("old-K3"));

    let fetched = client.fetch_with_source("K3").await.unwrap();
    assert_eq!(fetched.value, "old-K3");
    assert_eq!(
        fetched.source,
        FetchSource::Cache {
            stale: true,
            cause: CallFailure::RemoteRejected { status: 503 }
        }
    );
}

// ==================== Orchestration Details ====================

#[tokio::test]
async fn test_repeated_fetch_is_idempotent() {
    let mut remote = MockRemote::new();
    remote
        .expect_invoke()
        .times(2)
        .returning(|_| Ok(r#"{"item":"banana","quantity":12}"#.to_string()));

    let cache = Arc::new(InMemoryCacheStore::new());
    let client = ResilientClient::new(
        test_config(),
        Arc::new(remote),
        cache.clone(),
        JsonDecoder::<Inventory>::new(),
    );

    let first = client.fetch("banana").await.unwrap();
    let second = client.fetch("banana").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.quantity, 12);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_decode_failure_counts_and_is_not_cached() {
    let mut remote = MockRemote::new();
    remote
        .expect_invoke()
        .times(1)
        .returning(|_| Ok("<html>maintenance</html>".to_string()));

    let cache = Arc::new(InMemoryCacheStore::new());
    let client = ResilientClient::new(
        test_config(),
        Arc::new(remote),
        cache.clone(),
        JsonDecoder::<Inventory>::new(),
    );

    let err = client.fetch("banana").await.unwrap_err();
    assert!(matches!(err.cause(), Some(CallFailure::Decode(_))));
    assert_eq!(client.circuit_snapshot().consecutive_failures, 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_breaker_recovers_after_break_duration() {
    let mut remote = MockRemote::new();
    let mut calls = 0;
    remote.expect_invoke().times(3).returning(move |_| {
        calls += 1;
        if calls <= 2 {
            Err(TransportError::Request("refused".to_string()))
        } else {
            Ok("fresh".to_string())
        }
    });

    let config = ClientConfig {
        failure_threshold: 2,
        break_duration: Duration::from_millis(100),
        ..test_config()
    };
    let client = text_client(config, Arc::new(remote), Arc::new(InMemoryCacheStore::new()));

    for _ in 0..2 {
        assert!(client.fetch("K").await.is_err());
    }
    assert_eq!(client.circuit_state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let fetched = client.fetch_with_source("K").await.unwrap();
    assert_eq!(fetched.source, FetchSource::Remote);
    assert_eq!(client.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_cache_failures_never_fail_a_live_call() {
    let mut remote = MockRemote::new();
    let mut calls = 0;
    remote.expect_invoke().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Ok("live".to_string())
        } else {
            Err(TransportError::Request("refused".to_string()))
        }
    });

    let client = ResilientClient::new(
        test_config(),
        Arc::new(remote),
        Arc::new(BrokenCache),
        TextDecoder,
    );

    assert_eq!(client.fetch("K").await.unwrap(), "live");

    // Read errors on the fallback path behave like a miss
    let err = client.fetch("K").await.unwrap_err();
    assert!(err.is_cache_miss());
}

// ==================== Bulkhead Rejection Policy ====================

async fn saturated_client(
    policy: BulkheadRejectionPolicy,
) -> (Arc<ResilientClient<TextDecoder>>, tokio::task::JoinHandle<()>) {
    let config = ClientConfig {
        max_concurrency: 1,
        max_queue_depth: 0,
        bulkhead_rejection: policy,
        request_timeout: Duration::from_secs(5),
        ..test_config()
    };
    let cache = Arc::new(InMemoryCacheStore::new());
    let client = Arc::new(text_client(
        config,
        SlowRemote::new(Duration::from_secs(1)),
        cache.clone(),
    ));
    cache.insert_entry(client.cache_key("busy"), stale_entry("cached-busy"));

    let holder = {
        let client = client.clone();
        tokio::spawn(async move {
            let _ = client.fetch("holder").await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.bulkhead_stats().active, 1);

    (client, holder)
}

#[tokio::test]
async fn test_bulkhead_rejection_propagates_by_default() {
    let (client, holder) = saturated_client(BulkheadRejectionPolicy::Propagate).await;

    let err = client.fetch("busy").await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::BulkheadRejected(BulkheadError::QueueFull { .. })
    ));
    assert!(!err.is_cache_miss());
    assert_eq!(client.circuit_snapshot().consecutive_failures, 0);

    holder.abort();
}

#[tokio::test]
async fn test_bulkhead_rejection_fallback_policy_serves_cache() {
    let (client, holder) = saturated_client(BulkheadRejectionPolicy::Fallback).await;

    let fetched = client.fetch_with_source("busy").await.unwrap();
    assert_eq!(fetched.value, "cached-busy");
    assert!(matches!(
        fetched.source,
        FetchSource::Cache {
            stale: true,
            cause: CallFailure::BulkheadRejected(BulkheadError::QueueFull { .. })
        }
    ));
    assert_eq!(client.circuit_snapshot().consecutive_failures, 0);

    holder.abort();
}

// ==================== Cancellation ====================

#[tokio::test]
async fn test_cancelled_in_flight_call_counts_as_failure() {
    let remote = SlowRemote::new(Duration::from_secs(10));
    let config = ClientConfig {
        failure_threshold: 1,
        request_timeout: Duration::from_secs(20),
        ..test_config()
    };
    let client = Arc::new(text_client(config, remote.clone(), Arc::new(InMemoryCacheStore::new())));

    let handle = {
        let client = client.clone();
        tokio::spawn(async move { client.fetch("K").await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.started.load(Ordering::SeqCst), 1);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert_eq!(client.circuit_state(), CircuitState::Open);
    assert_eq!(client.bulkhead_stats().active, 0);
}

#[tokio::test]
async fn test_cancelled_waiter_is_neutral() {
    let remote = SlowRemote::new(Duration::from_secs(10));
    let config = ClientConfig {
        failure_threshold: 1,
        max_concurrency: 1,
        max_queue_depth: 1,
        request_timeout: Duration::from_secs(20),
        ..test_config()
    };
    let client = Arc::new(text_client(config, remote.clone(), Arc::new(InMemoryCacheStore::new())));

    let holder = {
        let client = client.clone();
        tokio::spawn(async move { client.fetch("first").await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.fetch("second").await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(client.bulkhead_stats().queued, 1);

    waiter.abort();
    let _ = waiter.await;

    assert_eq!(client.bulkhead_stats().queued, 0);
    assert_eq!(client.bulkhead_stats().active, 1);
    assert_eq!(client.circuit_state(), CircuitState::Closed);
    assert_eq!(remote.started.load(Ordering::SeqCst), 1);

    holder.abort();
}
