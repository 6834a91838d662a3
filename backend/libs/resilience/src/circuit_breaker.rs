/// Circuit Breaker implementation with consecutive-failure tracking
///
/// State transitions:
/// - Closed → Open: when consecutive failures reach the threshold
/// - Open → HalfOpen: first caller after the break duration becomes the single trial
/// - HalfOpen → Closed: trial succeeds
/// - HalfOpen → Open: trial fails (break timer restarts)
///
/// Admission is expressed as a [`CallPermit`]. Only callers holding a permit can
/// report an outcome, so rejected calls never move the counters.
use crate::metrics::CircuitBreakerMetrics;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Circuit is open, requests fail fast
    Open,
    /// A single trial request is probing the dependency
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failure count to trigger circuit open
    pub failure_threshold: u32,
    /// Duration to stay Open before admitting a trial call
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("Circuit breaker is open - failing fast")]
    Open,
    #[error("Call failed: {0}")]
    CallFailed(String),
}

/// Point-in-time view of the breaker, for monitoring and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Shared>,
}

struct Shared {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

struct BreakerState {
    current: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Bumped on every transition into Open; permits from older generations are stale
    generation: u64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("default", config)
    }

    pub fn named(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                name: name.into(),
                config,
                state: RwLock::new(BreakerState {
                    current: CircuitState::Closed,
                    consecutive_failures: 0,
                    opened_at: None,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    /// Ask for admission. The returned permit must be resolved with
    /// [`CallPermit::on_success`] or [`CallPermit::on_failure`].
    pub fn allow_request(&self) -> Result<CallPermit, CircuitBreakerError> {
        let mut state = self.inner.state.write();

        match state.current {
            CircuitState::Closed => Ok(self.permit(PermitKind::Normal, state.generation)),
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= self.inner.config.break_duration)
                    .unwrap_or(true);

                if elapsed {
                    info!(breaker = %self.inner.name, "Circuit breaker: Open → HalfOpen");
                    CircuitBreakerMetrics::record_state_transition("open", "half_open");
                    state.current = CircuitState::HalfOpen;
                    Ok(self.permit(PermitKind::Trial, state.generation))
                } else {
                    CircuitBreakerMetrics::record_call("open", "rejected");
                    Err(CircuitBreakerError::Open)
                }
            }
            CircuitState::HalfOpen => {
                // The trial is already out; everyone else keeps failing fast
                CircuitBreakerMetrics::record_call("half_open", "rejected");
                Err(CircuitBreakerError::Open)
            }
        }
    }

    /// Execute a future with circuit breaker protection
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut permit = self.allow_request()?;
        permit.mark_in_flight();

        match f().await {
            Ok(result) => {
                permit.on_success();
                Ok(result)
            }
            Err(e) => {
                permit.on_failure();
                Err(CircuitBreakerError::CallFailed(e.to_string()))
            }
        }
    }

    /// Get current circuit state (for monitoring)
    pub fn state(&self) -> CircuitState {
        self.inner.state.read().current
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.inner.state.read();
        CircuitBreakerSnapshot {
            state: state.current,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at,
        }
    }

    fn permit(&self, kind: PermitKind, generation: u64) -> CallPermit {
        CallPermit {
            shared: self.inner.clone(),
            kind,
            generation,
            in_flight: false,
            resolved: false,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn record_success(&self, kind: PermitKind, generation: u64) {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!(breaker = %self.name, "Ignoring success from a previous breaker cycle");
            return;
        }

        match (state.current, kind) {
            (CircuitState::Closed, PermitKind::Normal) => {
                state.consecutive_failures = 0;
                CircuitBreakerMetrics::record_call("closed", "success");
            }
            (CircuitState::HalfOpen, PermitKind::Trial) => {
                info!(breaker = %self.name, "Circuit breaker: HalfOpen → Closed");
                CircuitBreakerMetrics::record_state_transition("half_open", "closed");
                CircuitBreakerMetrics::record_call("half_open", "success");
                if let Some(opened_at) = state.opened_at {
                    CircuitBreakerMetrics::record_open_duration(opened_at.elapsed().as_secs_f64());
                }
                state.current = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.opened_at = None;
            }
            _ => {}
        }
    }

    fn record_failure(&self, kind: PermitKind, generation: u64) {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!(breaker = %self.name, "Ignoring failure from a previous breaker cycle");
            return;
        }

        match (state.current, kind) {
            (CircuitState::Closed, PermitKind::Normal) => {
                state.consecutive_failures += 1;
                CircuitBreakerMetrics::record_call("closed", "failure");

                if state.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        "Circuit breaker: Closed → Open (failures: {})",
                        state.consecutive_failures
                    );
                    CircuitBreakerMetrics::record_state_transition("closed", "open");
                    self.open(&mut state);
                }
            }
            (CircuitState::HalfOpen, PermitKind::Trial) => {
                warn!(breaker = %self.name, "Circuit breaker: HalfOpen → Open (trial failed)");
                CircuitBreakerMetrics::record_state_transition("half_open", "open");
                CircuitBreakerMetrics::record_call("half_open", "failure");
                self.open(&mut state);
            }
            _ => {}
        }
    }

    /// Trial never reached the dependency; hand the trial slot back
    fn abandon_trial(&self, generation: u64) {
        let mut state = self.state.write();
        if state.generation == generation && state.current == CircuitState::HalfOpen {
            debug!(breaker = %self.name, "Trial call abandoned, circuit back to Open");
            CircuitBreakerMetrics::record_state_transition("half_open", "open");
            state.current = CircuitState::Open;
        }
    }

    fn open(&self, state: &mut BreakerState) {
        state.current = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        state.consecutive_failures = 0;
        state.generation += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    Normal,
    Trial,
}

/// Admission granted by [`CircuitBreaker::allow_request`].
///
/// Dropping an unresolved permit counts as a failure if it was marked in
/// flight, and as nothing otherwise.
#[must_use = "an unresolved permit reports nothing to the breaker"]
pub struct CallPermit {
    shared: Arc<Shared>,
    kind: PermitKind,
    generation: u64,
    in_flight: bool,
    resolved: bool,
}

impl CallPermit {
    /// Whether this permit is the single HalfOpen trial
    pub fn is_trial(&self) -> bool {
        self.kind == PermitKind::Trial
    }

    /// The remote call is about to start; from now on cancellation is a failure
    pub fn mark_in_flight(&mut self) {
        self.in_flight = true;
    }

    pub fn on_success(mut self) {
        self.resolved = true;
        self.shared.record_success(self.kind, self.generation);
    }

    pub fn on_failure(mut self) {
        self.resolved = true;
        self.shared.record_failure(self.kind, self.generation);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }

        if self.in_flight {
            warn!(breaker = %self.shared.name, "In-flight call cancelled, counting as failure");
            self.shared.record_failure(self.kind, self.generation);
        } else if self.kind == PermitKind::Trial {
            self.shared.abandon_trial(self.generation);
        }
    }
}

impl std::fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.shared.name)
            .field("trial", &self.is_trial())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
