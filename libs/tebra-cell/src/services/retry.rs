use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TebraError;

/// Bounded exponential backoff around one remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Near-zero delays for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    /// Delay before the attempt following `attempt` (zero-based). A server hint
    /// wins over the computed backoff but never exceeds `max_delay`.
    pub fn delay_for(&self, attempt: u32, error: &TebraError) -> Duration {
        if let TebraError::RateLimited {
            retry_after: Some(hint),
        } = error
        {
            return (*hint).min(self.max_delay);
        }

        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, TebraError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TebraError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!("{} failed after {} attempts: {}", operation, attempt, err);
                        return Err(TebraError::RemoteService {
                            attempts: attempt,
                            cause: Box::new(err),
                        });
                    }

                    let delay = self.delay_for(attempt - 1, &err);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        operation, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
