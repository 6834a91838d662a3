//! Error taxonomy for remote calls and fetches

use resilience::BulkheadError;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`Transport`](crate::Transport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote rejected the request with status {status}")]
    Rejected { status: u16 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Payload could not be decoded: {0}")]
pub struct DecodeError(pub String);

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError(err.to_string())
    }
}

/// Why the live call did not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// Rejected by the open breaker before any network activity
    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Transport failure: {0}")]
    Transport(TransportError),

    #[error("Remote returned status {status}")]
    RemoteRejected { status: u16 },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Bulkhead rejected the call: {0}")]
    BulkheadRejected(BulkheadError),
}

impl CallFailure {
    /// Whether this outcome advances the breaker's failure counter
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            CallFailure::Transport(_) | CallFailure::RemoteRejected { .. } | CallFailure::Decode(_)
        )
    }
}

impl From<TransportError> for CallFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { status } => CallFailure::RemoteRejected { status },
            other => CallFailure::Transport(other),
        }
    }
}

/// Error surfaced by [`ResilientClient::fetch`](crate::ResilientClient::fetch)
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Bulkhead rejected the call: {0}")]
    BulkheadRejected(BulkheadError),

    /// Live call unavailable and nothing cached for the key
    #[error("Service unavailable for key {key}: {cause}")]
    ServiceUnavailable { key: String, cause: CallFailure },
}

impl FetchError {
    /// True when the fallback cache had no usable entry
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, FetchError::ServiceUnavailable { .. })
    }

    pub fn cause(&self) -> Option<&CallFailure> {
        match self {
            FetchError::ServiceUnavailable { cause, .. } => Some(cause),
            FetchError::BulkheadRejected(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
