//! HTTP client for test bodies
//!
//! Keep-alive HTTP agent shared by every unit that talks to the same endpoint.

use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{FailureKind, UnitError};

/// Default idle connections kept per host
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 10;

/// HTTP client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Name resolution failed for {0}")]
    NameResolution(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl From<HttpError> for UnitError {
    fn from(err: HttpError) -> Self {
        let kind = match &err {
            HttpError::Timeout(_) => FailureKind::Timeout,
            HttpError::NameResolution(_) => FailureKind::NameResolution,
            HttpError::RequestFailed(msg) => FailureKind::classify(msg),
            // Nothing listens there; another attempt sees the same closed port
            HttpError::ConnectionRefused(_) | HttpError::InvalidUrl(_) | HttpError::Build(_) => {
                FailureKind::Other
            }
        };
        UnitError::new(kind, err.to_string())
    }
}

/// HTTP client for testing
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a keep-alive client holding up to `max_idle_per_host` idle sockets
    pub fn keep_alive(timeout_secs: u64, max_idle_per_host: usize) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .pool_max_idle_per_host(max_idle_per_host)
            .user_agent(concat!("test-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.clone();
        Url::parse(&url).map_err(|_| HttpError::InvalidUrl(url.clone()))?;
        debug!("Sending {} request to {}", request.method, url);

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::RequestFailed(format!("Invalid HTTP method: {}", request.method)))?;

        let mut req_builder = self.client.request(method, &url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let start = std::time::Instant::now();

        let response = req_builder
            .send()
            .await
            .map_err(|e| self.classify_error(e, &url))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        let body = response
            .text()
            .await
            .map_err(|e| self.classify_error(e, &url))?;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            body,
            duration_ms,
        })
    }

    fn classify_error(&self, e: reqwest::Error, url: &str) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            if is_dns_failure(&e) {
                HttpError::NameResolution(url.to_string())
            } else {
                HttpError::ConnectionRefused(url.to_string())
            }
        } else {
            HttpError::RequestFailed(e.to_string())
        }
    }

    /// Convenience method for GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::get(url)).await
    }
}

/// Walk the error source chain looking for a resolver failure
fn is_dns_failure(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        let text = err.to_string().to_lowercase();
        if text.contains("dns") || text.contains("failed to lookup") {
            return true;
        }
        source = err.source();
    }
    false
}

/// Origin (`scheme://host[:port]`) used to key per-endpoint agents
pub fn endpoint_of(url: &str) -> Result<String, HttpError> {
    let parsed = Url::parse(url).map_err(|_| HttpError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| HttpError::InvalidUrl(url.to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
