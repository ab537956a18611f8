//! Minimum-interval gate for rate-constrained providers.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between calls to a rate-limited service.
///
/// `acquire` waits until at least `60s / rpm_limit` has elapsed since the
/// previous acquire returned, then records the current time as the new
/// reference point. No internal locking; each provider instance is
/// driven by a single caller.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter for the given requests-per-minute budget.
    pub fn new(rpm_limit: u32) -> Self {
        let rpm = rpm_limit.max(1);
        Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(rpm)),
            last_call: None,
        }
    }

    /// The enforced minimum interval between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block (cooperatively) until the gate opens, then claim the slot.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limit gate, sleeping");
                tokio::time::sleep(wait).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
