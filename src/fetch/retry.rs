use super::client::HttpClient;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Statuses worth another attempt: timeouts and transient server errors.
pub const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// An [`HttpClient`] wrapper that retries idempotent reads on transient
/// statuses with exponential backoff.
///
/// Only `GET` and `HEAD` are retried; commands are sent once.
pub struct Retry<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C> Retry<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }

    pub fn with_backoff(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

#[async_trait]
impl<C: HttpClient> HttpClient for Retry<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if !is_idempotent(req.method()) {
            return self.inner.execute(req).await;
        }

        let mut attempt = 0;
        loop {
            let Some(next) = req.try_clone() else {
                return self.inner.execute(req).await;
            };

            let resp = self.inner.execute(next).await?;
            if attempt >= self.max_retries || !RETRY_STATUSES.contains(&resp.status()) {
                return Ok(resp);
            }

            let delay = self.base_delay * 2u32.pow(attempt);
            warn!(
                url = %req.url(),
                status = resp.status().as_u16(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Transient HTTP status, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
