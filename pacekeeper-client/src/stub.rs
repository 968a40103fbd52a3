//! Handles used to reach a limiter actor
//!
//! A [`LimiterStub`] is a capability that may go stale: the actor behind it
//! can be evicted or relocated at any time. Callers never repair a stub in
//! place, they ask their factory for a fresh one.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Request/response access to one limiter actor
#[async_trait]
pub trait LimiterStub: Send + Sync {
    /// Ask the actor how long to wait before the next unit of work
    ///
    /// `mutating` requests consume capacity; peeks only observe the backlog.
    async fn admit(&self, mutating: bool) -> Result<Duration>;
}

/// Builder for creating an [`HttpLimiterStub`]
pub struct HttpStubBuilder {
    base_url: String,
    key: String,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl HttpStubBuilder {
    /// Create a builder targeting the server at `base_url` (e.g. `http://127.0.0.1:8080`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            key: "A".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set the limiter key (one key per independent budget)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the stub
    pub fn build(self) -> Result<HttpLimiterStub> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()?;

        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        // Segments are percent-encoded, so any key stays a single segment
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("limiter")
            .push(&self.key);

        Ok(HttpLimiterStub { http, url })
    }
}

/// Limiter stub speaking to `pacekeeper-server` over HTTP
///
/// `POST /limiter/{key}` performs a consuming check and `GET` a peek; the
/// response body is the wait in milliseconds.
#[derive(Clone, Debug)]
pub struct HttpLimiterStub {
    http: reqwest::Client,
    url: reqwest::Url,
}

impl HttpLimiterStub {
    pub fn builder(base_url: impl Into<String>) -> HttpStubBuilder {
        HttpStubBuilder::new(base_url)
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// A factory handing out fresh stubs for the same limiter
    ///
    /// Suitable as the factory argument of
    /// [`RateLimiterClient::new`](crate::RateLimiterClient::new).
    pub fn factory(&self) -> impl Fn() -> Arc<dyn LimiterStub> + Send + Sync + 'static {
        let template = self.clone();
        move || Arc::new(template.clone()) as Arc<dyn LimiterStub>
    }
}

#[async_trait]
impl LimiterStub for HttpLimiterStub {
    async fn admit(&self, mutating: bool) -> Result<Duration> {
        let request = if mutating {
            self.http.post(self.url.clone())
        } else {
            self.http.get(self.url.clone())
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_wait(&body)
    }
}

/// Parse a limiter response body: a single non-negative integer of milliseconds
pub(crate) fn parse_wait(body: &str) -> Result<Duration> {
    body.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ClientError::InvalidResponse(body.to_string()))
}
