//! Fetch each key given on the command line through a resilient client
//!
//! Environment:
//! - `FETCH_BASE_URL` (required) and `FETCH_PATH_TEMPLATE` (default `/{key}`)
//! - `FETCH_REDIS_URL` (optional, in-memory cache when unset)
//! - any `FETCH_*` client setting

use fetch_cache::{CacheStore, InMemoryCacheStore, RedisCacheStore};
use fetch_client::{ClientConfig, FetchSource, HttpTransport, ResilientClient, TextDecoder};
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;

    let base_url = env::var("FETCH_BASE_URL").map_err(|_| "FETCH_BASE_URL must be set")?;
    let path_template = env::var("FETCH_PATH_TEMPLATE").unwrap_or_else(|_| "/{key}".to_string());

    let cache: Arc<dyn CacheStore> = match env::var("FETCH_REDIS_URL") {
        Ok(url) => {
            info!("Using Redis cache");
            Arc::new(RedisCacheStore::connect(&url).await?)
        }
        Err(_) => {
            info!("Using in-memory cache");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    let client = ResilientClient::new(
        config,
        Arc::new(HttpTransport::new(base_url, path_template)),
        cache,
        TextDecoder,
    );

    let keys: Vec<String> = env::args().skip(1).collect();
    if keys.is_empty() {
        warn!("No keys given; usage: fetch-probe <key>...");
        return Ok(());
    }

    for key in &keys {
        match client.fetch_with_source(key).await {
            Ok(fetched) => match fetched.source {
                FetchSource::Remote => info!(key = %key, bytes = fetched.value.len(), "Fetched live"),
                FetchSource::Cache { stale, cause } => {
                    info!(key = %key, stale, cause = %cause, bytes = fetched.value.len(), "Served from cache")
                }
            },
            Err(e) => error!(key = %key, error = %e, "Fetch failed"),
        }
    }

    info!(
        circuit = client.circuit_state().as_str(),
        active = client.bulkhead_stats().active,
        "Probe finished"
    );
    Ok(())
}
