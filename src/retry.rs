//! Bounded retry with exponential backoff for rate-limited upstream calls.
//! Only rate-limit failures are retried; anything else ends the loop immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::UpstreamError;

/// How a retried call ended.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    /// Still rate limited after the last attempt.
    RateLimitExceeded { attempts: u32 },
    /// A non-rate-limit failure; never retried.
    Failed(UpstreamError),
    /// The attempt budget ran out without a terminal classification.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails terminally, or the budget is spent.
    /// The delay before retry `n` is `initial_delay * 2^(n-1)`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut delay = self.initial_delay;

        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) if e.is_rate_limited() => {
                    if attempt >= self.max_attempts {
                        warn!(attempt, error = %e, "rate limited, retries exhausted");
                        return RetryOutcome::RateLimitExceeded { attempts: attempt };
                    }
                    warn!(
                        attempt,
                        wait_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return RetryOutcome::Failed(e),
            }
        }

        RetryOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}
