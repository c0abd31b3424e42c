//! HTTP fetcher implementation
//!
//! This module handles all plain HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests for page content, with per-call headers
//! - Error classification into [`FetchError`] kinds

use crate::config::HttpConfig;
use crate::extract::Page;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Capability to retrieve a document over the network
///
/// The crawler never performs network I/O itself; it asks a `Fetcher`.
/// Implementations must be shareable across concurrent tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, sending `headers` in addition to the fetcher's defaults
    async fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<Page, FetchError>;
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher from the `[http]` section of a job file
    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self::new(build_http_client(config)?))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - A default header was malformed or the client failed to build
pub fn build_http_client(config: &HttpConfig) -> Result<Client, FetchError> {
    let mut defaults = HeaderMap::new();
    for (name, value) in &config.headers {
        let (name, value) = header_pair(name, value)?;
        defaults.insert(name, value);
    }

    Ok(Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(defaults)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()?)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<Page, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            let (name, value) = header_pair(name, value)?;
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify(url, e))?;
        tracing::debug!("Fetched {} ({} bytes)", final_url, body.len());

        Ok(Page::new(final_url, body))
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), FetchError> {
    let invalid = |message: String| FetchError::Network {
        url: String::new(),
        message,
    };
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| invalid(format!("invalid header name '{}': {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| invalid(format!("invalid value for header '{}': {}", name, e)))?;
    Ok((name, value))
}

/// Classifies a reqwest error
fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
