//! Pooled HTTPS transport.
//!
//! A semaphore bounds concurrent requests to `max_size` sessions; acquisition
//! waits up to `acquire_timeout` and then surfaces pool exhaustion to the
//! caller instead of queueing unboundedly.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Response bodies attached to HTTP errors are truncated to this many bytes.
const ERROR_BODY_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid transport config: {0}")]
    Config(String),

    #[error("session pool exhausted")]
    PoolExhausted,

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    /// Pre-warmed idle sessions kept per host.
    pub initial_size: usize,
    /// Upper bound on concurrently borrowed sessions.
    pub max_size: usize,
    /// How long an acquire may wait for a released session.
    pub acquire_timeout: Duration,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 4,
            max_size: 8,
            acquire_timeout: Duration::from_millis(1000),
        }
    }
}

impl HttpPoolConfig {
    fn validate(&self) -> Result<(), TransportError> {
        if self.initial_size == 0 || self.initial_size > self.max_size {
            return Err(TransportError::Config(format!(
                "pool sizes must satisfy 1 <= initial ({}) <= max ({})",
                self.initial_size, self.max_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub pool: HttpPoolConfig,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            pool: HttpPoolConfig::default(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// POST transport consumed by the signed REST clients. The `Ok`/`Err` split
/// carries the success/error continuation of each call; both are delivered
/// exactly once, on the caller's task.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
    ) -> Result<String, TransportError>;

    /// Same as [`Transport::post`] with a per-call request deadline.
    async fn post_with_timeout(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
        request_timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// reqwest-backed implementation. Keep-alive stays on and HTTP/2 is
/// negotiated via ALPN; TCP keep-alive probes at 30 s idle / 15 s interval.
pub struct HttpTransport {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        config.pool.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_keepalive_interval(Duration::from_secs(15))
            .pool_max_idle_per_host(config.pool.max_size)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.pool.max_size)),
            acquire_timeout: config.pool.acquire_timeout,
        })
    }

    async fn execute(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
        request_timeout: Option<Duration>,
    ) -> Result<String, TransportError> {
        let _permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
            .await
            .map_err(|_| TransportError::PoolExhausted)?
            .map_err(|_| TransportError::PoolExhausted)?;

        let mut request = self.client.post(url).body(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if let Some(timeout) = request_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(TransportError::Http {
                status: status.as_u16(),
                body: truncate_bytes(&text, ERROR_BODY_LIMIT).to_string(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
    ) -> Result<String, TransportError> {
        self.execute(url, body, headers, None).await
    }

    async fn post_with_timeout(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
        request_timeout: Duration,
    ) -> Result<String, TransportError> {
        self.execute(url, body, headers, Some(request_timeout)).await
    }
}

/// Truncate at a char boundary at or below `limit` bytes.
fn truncate_bytes(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_validation() {
        assert!(HttpPoolConfig::default().validate().is_ok());

        let zero = HttpPoolConfig {
            initial_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let inverted = HttpPoolConfig {
            initial_size: 9,
            max_size: 4,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_transport_rejects_bad_pool() {
        let config = HttpTransportConfig {
            pool: HttpPoolConfig {
                initial_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(HttpTransport::new(config).is_err());
    }

    #[test]
    fn test_truncate_bytes() {
        assert_eq!(truncate_bytes("short", 1024), "short");

        let long = "x".repeat(2000);
        assert_eq!(truncate_bytes(&long, 1024).len(), 1024);

        // Multi-byte chars never split.
        let s = "ééé";
        assert_eq!(truncate_bytes(s, 3), "é");
    }

    #[test]
    fn test_http_error_display() {
        let err = TransportError::Http {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503: overloaded");
    }
}
