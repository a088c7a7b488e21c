//! Page fetching with retry and backoff.
//!
//! One shared `reqwest::Client` with pooled connections. Client errors (4xx)
//! are terminal for the attempt; server errors, timeouts, and connection
//! failures are retried with a linearly increasing delay. Oversized bodies
//! are truncated rather than rejected.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use thiserror::Error;
use url::Url;

/// Response body cap. Large e-commerce pages can be several MB.
pub const MAX_CONTENT_SIZE: usize = 20 * 1024 * 1024;

/// Errors that can occur while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("client error status {0}")]
    ClientStatus(u16),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

/// Configuration for the page fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Total attempts per fetch (first try included)
    pub max_attempts: usize,
    /// Backoff unit; attempt N waits N × this before retrying
    pub retry_step: Duration,
    /// Maximum response size in bytes
    pub max_content_size: usize,
    /// Extra outbound headers from configuration
    pub custom_headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sitewatch/0.1".to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_step: Duration::from_secs(5),
            max_content_size: MAX_CONTENT_SIZE,
            custom_headers: Vec::new(),
        }
    }
}

/// Source of page content. The coordinator only depends on this boundary,
/// which keeps check cycles testable without a network.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch a page, returning its body text or a definitive failure.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// HTTP-backed page source
pub struct PageFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        for (key, value) in &config.custom_headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    tracing::warn!(header = %key, "skipping malformed custom header");
                }
            }
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() {
                        tracing::error!(
                            url = %url,
                            status = status.as_u16(),
                            "client error, not retrying"
                        );
                        return Err(FetchError::ClientStatus(status.as_u16()));
                    }
                    if status.is_server_error() {
                        tracing::warn!(
                            url = %url,
                            status = status.as_u16(),
                            attempt,
                            "server error"
                        );
                        last_error = format!("server error {}", status.as_u16());
                    } else {
                        match response.text().await {
                            Ok(body) => {
                                return Ok(cap_body(body, self.config.max_content_size, url));
                            }
                            Err(e) => {
                                tracing::warn!(url = %url, attempt, error = %e, "body read failed");
                                last_error = e.to_string();
                            }
                        }
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    tracing::warn!(url = %url, attempt, error = %e, "fetch failed");
                    last_error = e.to_string();
                }
                Err(e) => return Err(FetchError::Http(e)),
            }

            if attempt < self.config.max_attempts {
                let wait = self.config.retry_step * attempt as u32;
                tracing::info!(url = %url, wait_secs = wait.as_secs(), "retrying");
                tokio::time::sleep(wait).await;
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last: last_error,
        })
    }
}

/// Truncate an oversized body at a char boundary instead of failing the fetch.
fn cap_body(mut body: String, max_size: usize, url: &Url) -> String {
    if body.len() <= max_size {
        return body;
    }
    tracing::warn!(url = %url, size = body.len(), "content too large, truncating");
    let mut end = max_size;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body
}
