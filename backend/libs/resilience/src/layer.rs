/// Tower Layer integration for composable resilience patterns
use crate::bulkhead::{Bulkhead, BulkheadError};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Circuit Breaker Layer for Tower services
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    circuit_breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    pub fn new(circuit_breaker: CircuitBreaker) -> Self {
        Self { circuit_breaker }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            circuit_breaker: self.circuit_breaker.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    circuit_breaker: CircuitBreaker,
}

impl<S, Request> Service<Request> for CircuitBreakerService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: std::fmt::Display,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| CircuitBreakerError::CallFailed(e.to_string()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let circuit_breaker = self.circuit_breaker.clone();
        // Take the service that was driven to readiness, leave a clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            circuit_breaker
                .call(move || async move { inner.call(req).await.map_err(|e| e.to_string()) })
                .await
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BulkheadServiceError {
    #[error(transparent)]
    Rejected(#[from] BulkheadError),
    #[error("Call failed: {0}")]
    CallFailed(String),
}

/// Bulkhead Layer for Tower services
#[derive(Clone)]
pub struct BulkheadLayer {
    bulkhead: Bulkhead,
}

impl BulkheadLayer {
    pub fn new(bulkhead: Bulkhead) -> Self {
        Self { bulkhead }
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, service: S) -> Self::Service {
        BulkheadService {
            inner: service,
            bulkhead: self.bulkhead.clone(),
        }
    }
}

/// Admission happens inside the response future so queued requests do not
/// block `poll_ready` for everyone else.
#[derive(Clone)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Bulkhead,
}

impl<S, Request> Service<Request> for BulkheadService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: std::fmt::Display,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = BulkheadServiceError;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| BulkheadServiceError::CallFailed(e.to_string()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let bulkhead = self.bulkhead.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let _permit = bulkhead.acquire().await?;
            inner
                .call(req)
                .await
                .map_err(|e| BulkheadServiceError::CallFailed(e.to_string()))
        })
    }
}
