//! Cache key schema for fetched payloads
//!
//! Key format: v{VERSION}:{namespace}:{id}
//! The namespace names the remote resource (e.g. `company`, `inventory`).

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

/// Cache key builder bound to one remote resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    namespace: String,
}

impl CacheKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key for a single entity
    /// Format: v1:{namespace}:{id}
    pub fn for_id(&self, id: &str) -> String {
        format!("v{}:{}:{}", CACHE_VERSION, self.namespace, id)
    }

    /// Extract the namespace from a key built by this schema
    pub fn namespace_of(key: &str) -> Option<&str> {
        let mut parts = key.splitn(3, ':');
        let version = parts.next()?;
        if !version.starts_with('v') {
            return None;
        }
        let namespace = parts.next()?;
        parts.next().map(|_| namespace)
    }
}
