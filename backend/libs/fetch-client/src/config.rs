//! Client configuration
//!
//! Loaded from `FETCH_*` environment variables (a `.env` file is honoured),
//! with defaults for anything unset.

use crate::error::ConfigError;
use resilience::{BulkheadConfig, CircuitBreakerConfig, ServiceConfig};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "FETCH_";

/// What to do when the bulkhead turns a call away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkheadRejectionPolicy {
    /// Return `FetchError::BulkheadRejected` to the caller
    #[default]
    Propagate,
    /// Serve from cache, failing with `ServiceUnavailable` on a miss
    Fallback,
}

impl FromStr for BulkheadRejectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!(
                "bulkhead_rejection must be `propagate` or `fallback`, got `{}`",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name used for the breaker and bulkhead in logs and metrics
    pub name: String,
    pub failure_threshold: u32,
    pub break_duration: Duration,
    pub max_concurrency: usize,
    pub max_queue_depth: usize,
    pub acquire_timeout: Duration,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_namespace: String,
    pub bulkhead_rejection: BulkheadRejectionPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "remote".to_string(),
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            max_concurrency: 10,
            max_queue_depth: 20,
            acquire_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(fetch_cache::DEFAULT_TTL_SECS),
            cache_namespace: "remote".to_string(),
            bulkhead_rejection: BulkheadRejectionPolicy::Propagate,
        }
    }
}

/// Raw environment view; every field optional so defaults fill the gaps
#[derive(Debug, Default, Deserialize)]
struct EnvConfig {
    client_name: Option<String>,
    failure_threshold: Option<u32>,
    break_duration_ms: Option<u64>,
    max_concurrency: Option<usize>,
    max_queue_depth: Option<usize>,
    acquire_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    cache_ttl_secs: Option<u64>,
    cache_namespace: Option<String>,
    bulkhead_rejection: Option<String>,
}

impl ClientConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let raw: EnvConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        Self::from_raw(raw)
    }

    /// Load from explicit `(name, value)` pairs, using the same variable names
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: EnvConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: EnvConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut errors = Vec::new();

        let bulkhead_rejection = match raw.bulkhead_rejection.as_deref() {
            Some(value) => value.parse().unwrap_or_else(|e| {
                errors.push(e);
                defaults.bulkhead_rejection
            }),
            None => defaults.bulkhead_rejection,
        };

        let config = Self {
            name: raw.client_name.unwrap_or(defaults.name),
            failure_threshold: raw.failure_threshold.unwrap_or(defaults.failure_threshold),
            break_duration: raw
                .break_duration_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.break_duration),
            max_concurrency: raw.max_concurrency.unwrap_or(defaults.max_concurrency),
            max_queue_depth: raw.max_queue_depth.unwrap_or(defaults.max_queue_depth),
            acquire_timeout: raw
                .acquire_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),
            request_timeout: raw
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            cache_ttl: raw
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_namespace: raw.cache_namespace.unwrap_or(defaults.cache_namespace),
            bulkhead_rejection,
        };

        errors.extend(config.problems());
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Build from a resilience preset, keeping cache settings at their defaults
    pub fn from_service_preset(name: impl Into<String>, preset: &ServiceConfig) -> Self {
        let name = name.into();
        Self {
            cache_namespace: name.clone(),
            name,
            failure_threshold: preset.circuit_breaker.failure_threshold,
            break_duration: preset.circuit_breaker.break_duration,
            max_concurrency: preset.bulkhead.max_concurrency,
            max_queue_depth: preset.bulkhead.max_queue_depth,
            acquire_timeout: preset.bulkhead.acquire_timeout,
            request_timeout: preset.timeout.duration,
            ..Self::default()
        }
    }

    /// Check every setting, reporting all problems at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("client name must not be empty".to_string());
        }
        if self.failure_threshold == 0 {
            problems.push("failure_threshold must be at least 1".to_string());
        }
        if self.break_duration.is_zero() {
            problems.push("break_duration must be positive".to_string());
        }
        if self.max_concurrency == 0 {
            problems.push("max_concurrency must be at least 1".to_string());
        }
        if self.acquire_timeout.is_zero() {
            problems.push("acquire_timeout must be positive".to_string());
        }
        if self.request_timeout.is_zero() {
            problems.push("request_timeout must be positive".to_string());
        }
        if self.cache_namespace.is_empty() || self.cache_namespace.contains(':') {
            problems.push("cache_namespace must be non-empty and contain no ':'".to_string());
        }

        problems
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            break_duration: self.break_duration,
        }
    }

    pub fn bulkhead_config(&self) -> BulkheadConfig {
        BulkheadConfig {
            max_concurrency: self.max_concurrency,
            max_queue_depth: self.max_queue_depth,
            acquire_timeout: self.acquire_timeout,
        }
    }
}
