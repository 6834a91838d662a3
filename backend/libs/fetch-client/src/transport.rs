//! Remote call abstraction and its HTTP implementation

use crate::error::TransportError;
use async_trait::async_trait;
use tracing::debug;

/// Issues the live request for a key and returns the raw payload
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, key: &str) -> Result<String, TransportError>;
}

/// Placeholder substituted with the URL-encoded key
pub const KEY_PLACEHOLDER: &str = "{key}";

/// HTTP GET transport.
///
/// The request URL is `base_url` joined with `path_template`, where every
/// `{key}` is replaced by the URL-encoded key. Non-2xx responses are reported
/// as [`TransportError::Rejected`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    path_template: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, path_template: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, path_template)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        path_template: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            path_template: path_template.into(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        let path = self
            .path_template
            .replace(KEY_PLACEHOLDER, &urlencoding::encode(key));
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, key: &str) -> Result<String, TransportError> {
        let url = self.url_for(key);
        debug!(url = %url, "Invoking remote");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("path_template", &self.path_template)
            .finish()
    }
}
