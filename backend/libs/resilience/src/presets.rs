/// Preset configurations for common remote dependency types
use crate::bulkhead::BulkheadConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a service type
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
}

/// External HTTP APIs (third-party services)
///
/// - Timeout: 2s per request
/// - Circuit breaker: 5 failures, 30s break
/// - Bulkhead: 10 concurrent, 20 queued
pub fn http_external_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(2),
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
        },
        bulkhead: BulkheadConfig {
            max_concurrency: 10,
            max_queue_depth: 20,
            acquire_timeout: Duration::from_secs(5),
        },
    }
}

/// Internal gRPC services
///
/// - Timeout: 30s (long enough for complex operations)
/// - Circuit breaker: 5 failures, 60s break
/// - Bulkhead: 50 concurrent, 100 queued
pub fn grpc_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(30),
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            break_duration: Duration::from_secs(60),
        },
        bulkhead: BulkheadConfig {
            max_concurrency: 50,
            max_queue_depth: 100,
            acquire_timeout: Duration::from_secs(10),
        },
    }
}

/// Redis/Cache backends
///
/// - Timeout: 5s (cache should be fast)
/// - Circuit breaker: 3 failures, 15s break
/// - Bulkhead: 20 concurrent, no queue (shed load instead of waiting)
pub fn redis_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            break_duration: Duration::from_secs(15),
        },
        bulkhead: BulkheadConfig {
            max_concurrency: 20,
            max_queue_depth: 0,
            acquire_timeout: Duration::from_millis(100),
        },
    }
}
