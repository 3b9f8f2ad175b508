//! Stale-connection detection for the server keepalive.

use std::time::Duration;

/// Slack added on top of one and a half ping intervals.
pub const DEFAULT_PING_GRACE: Duration = Duration::from_secs(4);

/// Decides when a silent connection must be given up.
///
/// The server pings every `interval`; a connection that has not seen a ping
/// for more than `interval * 1.5 + grace` is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    interval: Option<Duration>,
    grace: Duration,
}

impl KeepAlive {
    /// Create a detector with no declared interval yet.
    pub fn new(grace: Duration) -> Self {
        Self {
            interval: None,
            grace,
        }
    }

    /// Record the ping interval declared by the server.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Maximum silence tolerated, `None` until the server declared an interval.
    pub fn threshold(&self) -> Option<Duration> {
        self.interval.map(|interval| {
            interval
                .saturating_add(interval / 2)
                .saturating_add(self.grace)
        })
    }

    /// Whether `since_last_ping` exceeds the threshold (strictly).
    pub fn is_stale(&self, since_last_ping: Duration) -> bool {
        self.threshold()
            .is_some_and(|threshold| since_last_ping > threshold)
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new(DEFAULT_PING_GRACE)
    }
}
