//! Bounded exponential-backoff retry for transient provider errors.

use std::time::Duration;

use newsloom_shared::{NewsloomError, Result};
use tracing::warn;

/// Retries an operation on transient errors only, with exponentially
/// growing delays clamped to a `[min_delay, max_delay]` window.
///
/// Non-transient errors propagate immediately. Once the attempt budget is
/// spent, the last error is wrapped in
/// [`NewsloomError::RetriesExhausted`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    multiplier: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    /// The reference deployment's policy: 5 attempts, 2s base doubling,
    /// clamped to 4s–60s.
    fn default() -> Self {
        Self::new(
            5,
            Duration::from_secs(2),
            2.0,
            Duration::from_secs(4),
            Duration::from_secs(60),
        )
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base: Duration,
        multiplier: f64,
        min_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            multiplier,
            min_delay,
            max_delay,
        }
    }

    /// Total attempt budget, including the first try.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay before retry `attempt` (1-based, matching the
    /// attempt counter): `clamp(base * multiplier^attempt, min_delay,
    /// max_delay)`, so the default policy sleeps 4s, 8s, 16s, 32s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base.as_secs_f64() * self.multiplier.powi(attempt.min(63) as i32);
        let capped = Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()));
        capped.clamp(self.min_delay, self.max_delay)
    }

    /// Run `f`, retrying transient failures up to the attempt budget.
    pub async fn run<T, F>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: AsyncFnMut() -> Result<T>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(NewsloomError::retries_exhausted(operation, attempt, e));
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "transient error, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
