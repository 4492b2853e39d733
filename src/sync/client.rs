//! HTTP client for the management server's device sync API

use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Response, Url};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::models::ManifestItem;

/// Longest response body excerpt carried in a status error
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("core API base URL is not configured")]
    NotConfigured,

    #[error("invalid core API base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("invalid device key header: {0}")]
    InvalidHeader(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed manifest: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub core_api_base: Option<String>,
    pub device_key: Option<String>,
    pub device_key_header: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            core_api_base: None,
            device_key: None,
            device_key_header: "X-Device-Key".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: concat!("mediasync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Authenticated client for `{base}/api/devicesync`
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SyncClient {
    client: Client,
    base: Option<Url>,
    auth: Option<(HeaderName, HeaderValue)>,
    request_timeout: Duration,
}

impl SyncClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let base = config
            .core_api_base
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Url::parse(s).map_err(|_| FetchError::InvalidBaseUrl(s.to_string())))
            .transpose()?;

        if let Some(url) = &base {
            if url.cannot_be_a_base() {
                return Err(FetchError::InvalidBaseUrl(url.to_string()));
            }
        }

        let auth = match config.device_key {
            Some(key) => {
                let name = HeaderName::from_bytes(config.device_key_header.as_bytes())
                    .map_err(|e| FetchError::InvalidHeader(e.to_string()))?;
                let mut value = HeaderValue::from_str(&key)
                    .map_err(|e| FetchError::InvalidHeader(e.to_string()))?;
                value.set_sensitive(true);
                Some((name, value))
            }
            None => {
                warn!("No device key configured, requests to the core API are unauthenticated");
                None
            }
        };

        Ok(Self {
            client,
            base,
            auth,
            request_timeout: config.request_timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base.is_some()
    }

    /// Fetch the authoritative file list (no retries)
    pub async fn fetch_manifest(&self, cancel: &CancellationToken) -> Result<Vec<ManifestItem>> {
        let url = self.endpoint(&[])?;
        debug!(%url, "Fetching manifest");

        let request = self.get(url).timeout(self.request_timeout);
        let mut response = self.send(request, cancel).await?;

        let mut body = Vec::new();
        while let Some(chunk) = read_chunk(&mut response, cancel).await? {
            body.extend_from_slice(&chunk);
        }

        let items: Vec<ManifestItem> =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(items = items.len(), "Manifest fetched");
        Ok(items)
    }

    /// Start the download of one manifest item; the body is read by the caller
    pub async fn open_download(&self, id: &str, cancel: &CancellationToken) -> Result<Response> {
        let url = self.endpoint(&[id])?;
        debug!(%url, "Requesting file");
        self.send(self.get(url), cancel).await
    }

    fn endpoint(&self, extra: &[&str]) -> Result<Url> {
        let mut url = self.base.clone().ok_or(FetchError::NotConfigured)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::InvalidBaseUrl(String::from("cannot-be-a-base")))?;
            segments.pop_if_empty().extend(["api", "devicesync"]);
            segments.extend(extra);
        }
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.auth {
            Some((name, value)) => request.header(name.clone(), value.clone()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = request.send() => result.map_err(map_transport_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        Ok(response)
    }
}

/// Read the next body chunk, giving up as soon as `cancel` fires
pub async fn read_chunk(response: &mut Response, cancel: &CancellationToken) -> Result<Option<Bytes>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        chunk = response.chunk() => chunk.map_err(map_transport_error),
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e.to_string())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: Option<&str>) -> SyncClient {
        SyncClient::new(ClientConfig {
            core_api_base: base.map(str::to_string),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.device_key_header, "X-Device-Key");
        assert!(config.user_agent.starts_with("mediasync/"));
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client_for(Some("https://core.example.com"));
        assert_eq!(
            client.endpoint(&[]).unwrap().as_str(),
            "https://core.example.com/api/devicesync"
        );
        assert_eq!(
            client.endpoint(&["17"]).unwrap().as_str(),
            "https://core.example.com/api/devicesync/17"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let client = client_for(Some("https://core.example.com/tenant/"));
        assert_eq!(
            client.endpoint(&["a/b"]).unwrap().as_str(),
            "https://core.example.com/tenant/api/devicesync/a%2Fb"
        );
    }

    #[test]
    fn test_missing_base_is_not_configured() {
        let client = client_for(None);
        assert!(!client.is_configured());
        assert!(matches!(client.endpoint(&[]), Err(FetchError::NotConfigured)));

        let blank = client_for(Some("   "));
        assert!(!blank.is_configured());
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SyncClient::new(ClientConfig {
            core_api_base: Some("not a url".to_string()),
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(FetchError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_invalid_header_name() {
        let result = SyncClient::new(ClientConfig {
            device_key: Some("secret".to_string()),
            device_key_header: "bad header".to_string(),
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(FetchError::InvalidHeader(_))));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let client = client_for(Some("http://127.0.0.1:9"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.fetch_manifest(&cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
