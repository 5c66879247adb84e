use super::CollectionError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Backoff applied by the coordinator when a collection attempt fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay before the attempt following `attempt` (1-based), doubling each
    /// time up to `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, CollectionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollectionError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "Collection succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        error = %e,
                        node_id = e.node_id(),
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        "Collection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        node_id = e.node_id(),
                        attempts = attempt,
                        "Collection failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
