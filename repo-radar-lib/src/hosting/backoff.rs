use core::time::Duration;
use rand::Rng;

/// Bounded exponential backoff with random jitter.
///
/// The delay before retry `attempt` (zero-based) is `base * 2^attempt`, capped at
/// `max_delay`. A `Retry-After` hint from the server raises the delay, still subject
/// to the cap. Jitter uniformly drawn from `[0, delay/2]` is then added so that
/// concurrent callers don't retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Whether another retry is permitted after `attempt` retries have been made.
    #[must_use]
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// The capped delay before retry `attempt`, without jitter.
    #[must_use]
    pub fn capped_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exponential = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);

        let delay = retry_after.map_or(exponential, |hint| exponential.max(hint));
        delay.min(self.max_delay)
    }

    /// The delay before retry `attempt`, including jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.capped_delay(attempt, retry_after);
        delay + jitter(delay / 2)
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }

    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
