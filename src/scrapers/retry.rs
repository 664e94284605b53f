//! Retry with exponential backoff and a per-attempt timeout.
//!
//! [`RetryFetch`] wraps any [`PageSource`] and transparently retries failed
//! fetches. Each attempt is bounded by `attempt_timeout`, so a page that never
//! answers costs at most `max_attempts * attempt_timeout` plus backoff.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(n) = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter_ms)
//! ```
//!
//! With the defaults (3 attempts, 1s base, 10s cap) a dead page is given up
//! on after two waits of roughly 1s and 2s.

use super::PageSource;
use crate::config::RetryPolicy;
use crate::errors::FetchError;
use crate::models::Page;
use async_trait::async_trait;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, instrument, warn};

/// Decorator that adds retries and timeouts to a [`PageSource`].
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: PageSource,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .policy
            .base_delay()
            .saturating_mul(1u32 << shift)
            .min(self.policy.max_delay());
        let jitter_ms = if self.policy.jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=self.policy.jitter_ms)
        };
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl<T> PageSource for RetryFetch<T>
where
    T: PageSource,
{
    async fn prepare(&self) -> Result<(), FetchError> {
        self.inner.prepare().await
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        let total_t0 = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let attempt_timeout = self.policy.attempt_timeout();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let result = match timeout(attempt_timeout, self.inner.fetch_page(url)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::new(
                    url,
                    format!("timed out after {}s", attempt_timeout.as_secs()),
                )),
            };

            let e = match result {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                error!(
                    attempt,
                    max = max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %e,
                    "fetch exhausted retries"
                );
                return Err(FetchError::new(
                    url,
                    format!("gave up after {attempt} attempts: {}", e.reason),
                ));
            }

            let delay = self.backoff(attempt);
            warn!(
                attempt,
                max = max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                ?delay,
                error = %e,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::stub::StubPageSource;

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
            attempt_timeout_secs: 1,
        }
    }

    const URL: &str = "https://acme.example/news/article-1";

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let stub = StubPageSource::new().with_site("https://acme.example/", 1).failing(URL, 2);
        let calls = stub.calls();
        let retry = RetryFetch::new(stub, policy(3));
        let page = retry.fetch_page(URL).await.unwrap();
        assert_eq!(page.url, URL);
        assert_eq!(calls.count(URL), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_single_error() {
        let stub = StubPageSource::new().with_site("https://acme.example/", 1).failing(URL, 10);
        let calls = stub.calls();
        let retry = RetryFetch::new(stub, policy(3));
        let err = retry.fetch_page(URL).await.unwrap_err();
        assert_eq!(calls.count(URL), 3);
        assert_eq!(err.url, URL);
        assert!(err.reason.starts_with("gave up after 3 attempts"));
    }

    #[tokio::test]
    async fn test_hanging_page_times_out() {
        let stub = StubPageSource::new().hanging(URL);
        let retry = RetryFetch::new(stub, policy(2));
        let started = Instant::now();
        let err = retry.fetch_page(URL).await.unwrap_err();
        assert!(err.reason.contains("timed out after 1s"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let retry = RetryFetch::new(
            StubPageSource::new(),
            RetryPolicy {
                max_attempts: 5,
                base_delay_ms: 100,
                max_delay_ms: 300,
                jitter_ms: 0,
                attempt_timeout_secs: 1,
            },
        );
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(300));
        assert_eq!(retry.backoff(4), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let retry = RetryFetch::new(
            StubPageSource::new(),
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 10,
                jitter_ms: 5,
                attempt_timeout_secs: 1,
            },
        );
        for _ in 0..50 {
            let d = retry.backoff(1);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(15));
        }
    }
}
