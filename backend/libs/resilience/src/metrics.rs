/// Prometheus metrics for the breaker, bulkhead and timeout wrappers
///
/// Recorders are always callable; without the `metrics` feature they compile
/// to nothing.

#[cfg(feature = "metrics")]
mod prom {
    use once_cell::sync::Lazy;
    use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};

    pub(super) static BREAKER_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_circuit_breaker_state_transitions_total",
            "Circuit breaker state transitions",
            &["from", "to"]
        )
        .expect("breaker transition metric registers once")
    });

    pub(super) static BREAKER_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_circuit_breaker_calls_total",
            "Calls seen by the circuit breaker, by state and outcome",
            &["state", "result"]
        )
        .expect("breaker call metric registers once")
    });

    pub(super) static BREAKER_OPEN_SECONDS: Lazy<Histogram> = Lazy::new(|| {
        register_histogram!(
            "resilience_circuit_breaker_open_duration_seconds",
            "Time from opening until a successful trial closed the breaker"
        )
        .expect("breaker open duration metric registers once")
    });

    pub(super) static BULKHEAD_ADMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_bulkhead_admissions_total",
            "Bulkhead admissions, immediate or after queueing",
            &["bulkhead", "path"]
        )
        .expect("bulkhead admission metric registers once")
    });

    pub(super) static BULKHEAD_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_bulkhead_rejections_total",
            "Bulkhead rejections by reason",
            &["bulkhead", "reason"]
        )
        .expect("bulkhead rejection metric registers once")
    });

    pub(super) static TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_timeout_operations_total",
            "Deadline-wrapped operations by outcome",
            &["result"]
        )
        .expect("timeout metric registers once")
    });
}

pub struct CircuitBreakerMetrics;

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
impl CircuitBreakerMetrics {
    pub fn record_state_transition(from: &str, to: &str) {
        #[cfg(feature = "metrics")]
        prom::BREAKER_TRANSITIONS.with_label_values(&[from, to]).inc();
    }

    pub fn record_call(state: &str, result: &str) {
        #[cfg(feature = "metrics")]
        prom::BREAKER_CALLS.with_label_values(&[state, result]).inc();
    }

    pub fn record_open_duration(duration_secs: f64) {
        #[cfg(feature = "metrics")]
        prom::BREAKER_OPEN_SECONDS.observe(duration_secs);
    }
}

pub struct BulkheadMetrics;

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
impl BulkheadMetrics {
    /// `path` is `immediate` or `queued`
    pub fn record_admission(bulkhead: &str, path: &str) {
        #[cfg(feature = "metrics")]
        prom::BULKHEAD_ADMISSIONS
            .with_label_values(&[bulkhead, path])
            .inc();
    }

    /// `reason` is `queue_full` or `timeout`
    pub fn record_rejection(bulkhead: &str, reason: &str) {
        #[cfg(feature = "metrics")]
        prom::BULKHEAD_REJECTIONS
            .with_label_values(&[bulkhead, reason])
            .inc();
    }
}

pub struct TimeoutMetrics;

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
impl TimeoutMetrics {
    pub fn record_operation(result: &str) {
        #[cfg(feature = "metrics")]
        prom::TIMEOUTS.with_label_values(&[result]).inc();
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_reach_default_registry() {
        BulkheadMetrics::record_rejection("metrics-test", "queue_full");
        CircuitBreakerMetrics::record_state_transition("closed", "open");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"resilience_bulkhead_rejections_total".to_string()));
        assert!(names.contains(&"resilience_circuit_breaker_state_transitions_total".to_string()));
    }
}
