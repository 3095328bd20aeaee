//! Outbound HTTP plumbing
//!
//! [`HttpFetcher`] wraps one `reqwest::Client` carrying the configured
//! user agent and timeout. [`RetryPolicy`] is the bounded retry schedule
//! used for image fetches; it is pure data so the backoff can be tested
//! without I/O.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{AppError, AppResult, FetchError};

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET a URL and return the body as text
    pub async fn fetch_text(&self, url: &str, accept: &str) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", accept)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::upstream_status(url, status.as_u16()).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(url, bytes = body.len(), "fetched text body");
        Ok(body)
    }

    /// GET a URL and deserialize a JSON body
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::upstream_status(url, status.as_u16()).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::parse("json", e.to_string()))
    }

    /// GET a URL and return the raw body plus its content type
    pub async fn fetch_bytes(&self, url: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        let response = self
            .client
            .get(url)
            .header("Accept", "image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::upstream_status(url, status.as_u16()).into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(url, bytes = bytes.len(), "fetched binary body");
        Ok((bytes.to_vec(), content_type))
    }

    /// HEAD a URL; true when the upstream answers 2xx
    pub async fn head_ok(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Bounded retry schedule with linear backoff and jitter
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait before retrying after attempt number `attempt`
    /// (0-based). Linear in the attempt count, matching the original
    /// helper's `1s * (failures + 1)` schedule.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }

    /// Backoff with up to 10% jitter to avoid thundering retries
    pub fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let jitter_ms = (base.as_millis() as u64 / 10).max(1);
        base + Duration::from_millis(fastrand::u64(0..jitter_ms))
    }

    /// Run an async operation under this policy, sleeping between attempts
    ///
    /// Errors that cannot change on retry (definitive 4xx answers, bad
    /// input) are returned immediately instead of burning the backoff.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(attempt, error = %err, "attempt failed");
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_err = Some(err);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(self.backoff_with_jitter(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::internal("retry loop ran zero attempts")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_linear_in_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test]
    async fn run_stops_after_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: AppResult<u32> = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FetchError::upstream_status("http://u", 503).into())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_surfaces_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let result: AppResult<u32> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::upstream_status("http://u", 503).into()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_does_not_retry_definitive_status() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: AppResult<u32> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::upstream_status("http://u", 404).into()) }
            })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Fetch(FetchError::UpstreamStatus { status: 404, .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
