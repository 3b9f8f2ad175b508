//! Reconnect backoff.

use std::time::Duration;

/// Delay before the first retry.
pub const DEFAULT_BACKOFF_FLOOR: Duration = Duration::from_secs(2);
/// Upper bound for any retry delay.
pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::from_secs(32);
/// How long a connection must stay open before it counts as stable.
pub const DEFAULT_STABLE_AFTER: Duration = Duration::from_secs(8);

/// Parameters of the exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub floor: Duration,
    pub ceiling: Duration,
    pub stable_after: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            floor: DEFAULT_BACKOFF_FLOOR,
            ceiling: DEFAULT_BACKOFF_CEILING,
            stable_after: DEFAULT_STABLE_AFTER,
        }
    }
}

impl BackoffPolicy {
    /// Delay after `failures` consecutive failures: `min(ceiling, floor * 2^(failures-1))`.
    ///
    /// Zero failures yields the floor.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.floor.saturating_mul(factor).min(self.ceiling)
    }
}

/// Counts consecutive failed connections.
///
/// The counter is only cleared by a connection that stayed open for at least
/// `stable_after`; a socket that drops right after opening keeps growing the
/// delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Consecutive failures recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a terminal close and return the delay before the next attempt.
    ///
    /// # Arguments
    ///
    /// * `open_for` - How long the connection was open, `None` if it never opened
    pub fn record_close(&mut self, open_for: Option<Duration>) -> Duration {
        if open_for.is_some_and(|d| d >= self.policy.stable_after) {
            self.failures = 0;
        }
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for(self.failures)
    }

    /// Forget all failures.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
