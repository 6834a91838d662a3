//! Resilient fetch client
//!
//! Wraps calls to an unreliable remote in a circuit breaker and a bulkhead,
//! caches every good payload, and serves the cached value (even a stale one)
//! whenever the live call is unavailable.
//!
//! ```rust,no_run
//! use fetch_cache::InMemoryCacheStore;
//! use fetch_client::{ClientConfig, HttpTransport, JsonDecoder, ResilientClient};
//! use std::sync::Arc;
//!
//! #[derive(serde::Deserialize)]
//! struct Company {
//!     id: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ResilientClient::new(
//!     ClientConfig::from_env()?,
//!     Arc::new(HttpTransport::new("http://localhost:8080", "/api/company/{key}")),
//!     Arc::new(InMemoryCacheStore::new()),
//!     JsonDecoder::<Company>::new(),
//! );
//! let company = client.fetch("123").await?;
//! println!("{}", company.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod transport;

pub use client::{FetchSource, Fetched, ResilientClient};
pub use config::{BulkheadRejectionPolicy, ClientConfig};
pub use decode::{JsonDecoder, PayloadDecoder, TextDecoder};
pub use error::{CallFailure, ConfigError, DecodeError, FetchError, TransportError};
pub use transport::{HttpTransport, Transport};
