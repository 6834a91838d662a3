/// Resilience patterns for remote dependencies
///
/// This library provides the fault-tolerance building blocks used by the fetch client:
/// - **Circuit Breaker**: Fails fast after consecutive failures, probes recovery with a single trial
/// - **Bulkhead**: Bounds in-flight calls with a bounded FIFO wait queue
/// - **Timeout**: Enforces time limits on all external calls
/// - **Tower Layer**: Composable middleware for Tower-based services
/// - **Preset Configurations**: Pre-tuned settings for HTTP, gRPC and Redis dependencies
///
/// # Example: Guarding a call with both gates
///
/// ```rust,no_run
/// use resilience::{presets, Bulkhead, CircuitBreaker};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::http_external_config();
///     let circuit_breaker = CircuitBreaker::named("inventory", config.circuit_breaker);
///     let bulkhead = Bulkhead::named("inventory", config.bulkhead);
///
///     if let Ok(mut permit) = circuit_breaker.allow_request() {
///         if let Ok(_slot) = bulkhead.acquire().await {
///             permit.mark_in_flight();
///             // Your remote call here
///             permit.on_success();
///         }
///     }
/// }
/// ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod layer;
pub mod metrics;
pub mod presets;
pub mod timeout;

// Re-export main types for convenience
pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadPermit, BulkheadStats};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot,
    CircuitState,
};
pub use layer::{BulkheadLayer, BulkheadService, BulkheadServiceError, CircuitBreakerLayer, CircuitBreakerService};
pub use presets::{grpc_config, http_external_config, redis_config, ServiceConfig};
pub use timeout::{with_timeout, TimeoutConfig, TimeoutError};
