//! HTTP text fetching with per-request timeouts and exponential backoff.
//!
//! Every network read in the pipeline (feeds, article pages, translation
//! requests) goes through the [`FetchText`] trait:
//! - [`HttpFetcher`]: `reqwest` client with a user agent and a hard timeout
//! - [`RetryFetch`]: Decorator that adds retry logic to any [`FetchText`]
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```
//!
//! A timeout is an ordinary failure: it is retried, and once retries are
//! exhausted the caller degrades exactly as for any other error.

use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Thread-safe boxed error, so failures can cross task boundaries.
pub type BoxError = Box<dyn Error + Send + Sync>;

const USER_AGENT: &str = concat!("curated_news/", env!("CARGO_PKG_VERSION"));

/// Fetch the body of a URL as text.
pub trait FetchText: Send + Sync {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, BoxError>> + Send;
}

/// Plain `reqwest` implementation of [`FetchText`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchText for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, BoxError> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body = resp.text().await?;
        debug!(%url, bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "GET ok");
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchText`].
pub struct RetryFetch<T> {
    inner: T,
    /// Retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: FetchText> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: FetchText> FetchText for RetryFetch<T> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_text(&self, url: &str) -> Result<String, BoxError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1))
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    debug!(attempt, ?delay, error = %e, "fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}
