/// Bulkhead (bounded concurrency with a bounded FIFO wait queue)
///
/// - At most `max_concurrency` permits are outstanding at any time
/// - Up to `max_queue_depth` callers wait for a slot, admitted strictly in arrival order
/// - Anyone beyond that is rejected immediately
///
/// A released slot is handed directly to the head of the queue, so the active
/// count never dips while there are waiters and late arrivals cannot jump the line.
use crate::metrics::BulkheadMetrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum concurrent permits
    pub max_concurrency: usize,
    /// Maximum callers waiting for a permit
    pub max_queue_depth: usize,
    /// How long a queued caller waits before giving up
    pub acquire_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_queue_depth: 20,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    #[error("Bulkhead full ({max_concurrency} active, {max_queue_depth} queued)")]
    QueueFull {
        max_concurrency: usize,
        max_queue_depth: usize,
    },
    #[error("Timed out after {0:?} waiting for a bulkhead slot")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadStats {
    pub active: usize,
    pub queued: usize,
    pub max_concurrency: usize,
    pub max_queue_depth: usize,
}

#[derive(Clone)]
pub struct Bulkhead {
    inner: Arc<Shared>,
}

struct Shared {
    name: String,
    config: BulkheadConfig,
    state: Mutex<BulkheadState>,
}

struct BulkheadState {
    active: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

impl Bulkhead {
    pub fn new(config: BulkheadConfig) -> Self {
        Self::named("default", config)
    }

    pub fn named(name: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(BulkheadState {
                    active: 0,
                    waiters: VecDeque::with_capacity(config.max_queue_depth),
                    next_waiter_id: 0,
                }),
                config,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.inner.config
    }

    /// Acquire a permit using the configured acquire timeout
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        self.acquire_timeout(self.inner.config.acquire_timeout).await
    }

    /// Acquire a permit, waiting in the queue for at most `timeout`
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<BulkheadPermit, BulkheadError> {
        let (grant_tx, grant_rx) = oneshot::channel();

        let waiter_id = {
            let mut state = self.inner.state.lock();

            if state.active < self.inner.config.max_concurrency {
                state.active += 1;
                BulkheadMetrics::record_admission(&self.inner.name, "immediate");
                return Ok(self.permit());
            }

            if state.waiters.len() >= self.inner.config.max_queue_depth {
                debug!(bulkhead = %self.inner.name, "Bulkhead queue full, rejecting");
                BulkheadMetrics::record_rejection(&self.inner.name, "queue_full");
                return Err(BulkheadError::QueueFull {
                    max_concurrency: self.inner.config.max_concurrency,
                    max_queue_depth: self.inner.config.max_queue_depth,
                });
            }

            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.waiters.push_back(Waiter {
                id,
                grant: grant_tx,
            });
            id
        };

        let mut queued = QueuedWaiter {
            shared: self.inner.clone(),
            id: waiter_id,
            grant: grant_rx,
            settled: false,
        };

        match tokio::time::timeout(timeout, &mut queued.grant).await {
            Ok(Ok(())) => {
                queued.settled = true;
                BulkheadMetrics::record_admission(&self.inner.name, "queued");
                Ok(self.permit())
            }
            Ok(Err(_)) => {
                // Sender dropped without a grant; the entry is already gone
                queued.settled = true;
                Err(BulkheadError::Timeout(timeout))
            }
            Err(_) => {
                queued.settled = true;
                let mut state = self.inner.state.lock();
                let position = state.waiters.iter().position(|w| w.id == waiter_id);
                match position {
                    Some(pos) => {
                        state.waiters.remove(pos);
                        drop(state);
                        warn!(
                            bulkhead = %self.inner.name,
                            timeout_ms = timeout.as_millis() as u64,
                            "Timed out waiting for bulkhead slot"
                        );
                        BulkheadMetrics::record_rejection(&self.inner.name, "timeout");
                        Err(BulkheadError::Timeout(timeout))
                    }
                    None => {
                        // The slot was transferred to us just before the deadline
                        BulkheadMetrics::record_admission(&self.inner.name, "queued");
                        Ok(self.permit())
                    }
                }
            }
        }
    }

    /// Take a permit only if a slot is free right now
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        let mut state = self.inner.state.lock();
        if state.active < self.inner.config.max_concurrency {
            state.active += 1;
            BulkheadMetrics::record_admission(&self.inner.name, "immediate");
            Some(self.permit())
        } else {
            None
        }
    }

    pub fn stats(&self) -> BulkheadStats {
        let state = self.inner.state.lock();
        BulkheadStats {
            active: state.active,
            queued: state.waiters.len(),
            max_concurrency: self.inner.config.max_concurrency,
            max_queue_depth: self.inner.config.max_queue_depth,
        }
    }

    fn permit(&self) -> BulkheadPermit {
        BulkheadPermit {
            shared: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Shared {
    /// Give the slot to the longest waiter, or free it
    fn release_slot(&self) {
        let mut state = self.state.lock();

        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }

        state.active = state.active.saturating_sub(1);
    }
}

/// Slot held in the bulkhead; released on drop
#[must_use = "dropping the permit releases the slot immediately"]
pub struct BulkheadPermit {
    shared: Arc<Shared>,
}

impl BulkheadPermit {
    pub fn release(self) {}
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.shared.release_slot();
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("bulkhead", &self.shared.name)
            .finish()
    }
}

/// Cleans up a queue entry if the acquiring future is dropped mid-wait.
///
/// Owns the receiving half so a grant can never land on a dropped receiver
/// while the queue entry is being inspected.
struct QueuedWaiter {
    shared: Arc<Shared>,
    id: u64,
    grant: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for QueuedWaiter {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut state = self.shared.state.lock();
        let position = state.waiters.iter().position(|w| w.id == self.id);
        if let Some(pos) = position {
            state.waiters.remove(pos);
            return;
        }
        drop(state);

        // Granted but nobody is left to use it
        self.shared.release_slot();
    }
}
