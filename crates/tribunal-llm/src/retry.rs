//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use tribunal_config::RatingSettings;

/// Retries an operation a fixed number of times.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, so the
/// default policy waits 1s then 2s. No delay follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl From<&RatingSettings> for RetryPolicy {
    fn from(settings: &RatingSettings) -> Self {
        Self { max_attempts: settings.max_attempts.max(1), base_delay: settings.backoff_base() }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. Returns the last error in the latter two cases.
    pub async fn run<T, E, F, Fut>(&self, mut op: F, is_retryable: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt + 1 < attempts => {
                    let delay = self.delay_after(attempt);
                    warn!("Attempt {}/{} failed ({}), retrying in {:?}", attempt + 1, attempts, e, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
