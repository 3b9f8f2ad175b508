//! Stream health classification.
//!
//! The heartbeat poller feeds each server response through [`classify`],
//! which is a pure function of its inputs; rendering the outcome is left to
//! [`StreamHealth::view`].

use std::fmt;
use std::time::Duration;

/// Time after page load by which playback should have started.
pub const DEFAULT_PLAYBACK_TIMEOUT: Duration = Duration::from_secs(20);
/// Duration of one stream segment.
pub const DEFAULT_SEGMENT_DURATION: Duration = Duration::from_secs(8);
/// Latency after which the viewer is told they are behind.
pub const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_secs(180);

/// One heartbeat response, replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeartbeatSnapshot {
    pub viewers: u64,
    pub title: String,
    pub online: bool,
    /// `None` when absent or not an integer
    pub current_segment: Option<i64>,
    /// Absolute stream start (Unix seconds); identifies the stream epoch
    pub start_abs: Option<f64>,
    /// Seconds the stream had been running when the response was produced
    pub start_rel: Option<f64>,
}

/// Thresholds used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthPolicy {
    pub playback_timeout: Duration,
    pub segment_duration: Duration,
    pub latency_threshold: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            playback_timeout: DEFAULT_PLAYBACK_TIMEOUT,
            segment_duration: DEFAULT_SEGMENT_DURATION,
            latency_threshold: DEFAULT_LATENCY_THRESHOLD,
        }
    }
}

impl HealthPolicy {
    /// Latency threshold expressed in segments (180 s / 8 s = 22.5 by default).
    pub fn latency_threshold_segments(&self) -> f64 {
        self.latency_threshold.as_secs_f64() / self.segment_duration.as_secs_f64()
    }
}

/// Everything the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInput {
    /// Server says the stream is online
    pub online: bool,
    /// Segment the server is publishing, `None` when absent or not an integer
    pub server_segment: Option<i64>,
    /// Segment this viewer has consumed, `None` when unknown
    pub local_segment: Option<i64>,
    /// The stream start changed since the previous heartbeat
    pub epoch_changed: bool,
    /// Time since the client started
    pub elapsed_since_load: Duration,
}

/// Outcome of one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamHealth {
    /// The stream is offline
    Ended,
    /// The stream restarted under the viewer
    Restarted,
    /// The stream is online but playback never started
    Unreachable,
    /// The viewer lags more than the latency threshold
    Behind,
    /// Everything is fine
    Online,
    /// The heartbeat request itself failed
    RequestFailed,
}

/// Status light colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        };
        f.write_str(name)
    }
}

/// What the status line shows for a [`StreamHealth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub message: String,
    pub indicator: Indicator,
    pub reload_stream: bool,
    pub reload_page: bool,
}

/// Classify a heartbeat. Rules are evaluated in order and the first match wins.
pub fn classify(input: &HealthInput, policy: &HealthPolicy) -> StreamHealth {
    if !input.online {
        return StreamHealth::Ended;
    }
    let Some(server_segment) = input.server_segment else {
        return StreamHealth::Restarted;
    };
    if input.epoch_changed {
        return StreamHealth::Restarted;
    }
    match input.local_segment {
        None if input.elapsed_since_load >= policy.playback_timeout => StreamHealth::Unreachable,
        None => StreamHealth::Online,
        Some(local_segment) => {
            let diff = server_segment.saturating_sub(local_segment);
            if diff as f64 >= policy.latency_threshold_segments() {
                StreamHealth::Behind
            } else if diff < 0 {
                StreamHealth::Restarted
            } else {
                StreamHealth::Online
            }
        }
    }
}

impl StreamHealth {
    /// Render the outcome for the status line.
    pub fn view(&self, policy: &HealthPolicy) -> StatusView {
        let (message, indicator, reload_stream, reload_page) = match self {
            Self::Ended => ("The stream has ended.".to_string(), Indicator::Red, false, false),
            Self::Restarted => (
                "The stream restarted. Reload the stream.".to_string(),
                Indicator::Yellow,
                true,
                false,
            ),
            Self::Unreachable => (
                "The stream is online but you're not receiving it. Try refreshing the page."
                    .to_string(),
                Indicator::Yellow,
                false,
                true,
            ),
            Self::Behind => (
                format!(
                    "You're more than {} seconds behind the stream. Reload the stream.",
                    policy.latency_threshold.as_secs()
                ),
                Indicator::Yellow,
                true,
                false,
            ),
            Self::Online => ("The stream is online.".to_string(), Indicator::Green, false, false),
            Self::RequestFailed => (
                "The stream was unreachable. Try refreshing the page.".to_string(),
                Indicator::Yellow,
                false,
                true,
            ),
        };
        StatusView {
            message,
            indicator,
            reload_stream,
            reload_page,
        }
    }
}

/// Remembers the stream start reported by the previous heartbeat.
#[derive(Debug, Clone, Default)]
pub struct EpochTracker {
    last: Option<Option<f64>>,
}

impl EpochTracker {
    /// Record `epoch` and report whether it differs from the previous one.
    ///
    /// The very first observation only establishes the baseline.
    pub fn observe(&mut self, epoch: Option<f64>) -> bool {
        let changed = matches!(self.last, Some(previous) if previous != epoch);
        self.last = Some(epoch);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(server: Option<i64>, local: Option<i64>) -> HealthInput {
        HealthInput {
            online: true,
            server_segment: server,
            local_segment: local,
            epoch_changed: false,
            elapsed_since_load: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_latency_threshold_segments_default() {
        // テスト項目: 既定の遅延閾値は 22.5 セグメント
        assert_eq!(HealthPolicy::default().latency_threshold_segments(), 22.5);
    }

    #[test]
    fn test_classify_behind() {
        // テスト項目: server=30, local=5 (差 25 >= 22.5) は behind
        // given (前提条件):
        let policy = HealthPolicy::default();

        // when (操作):
        let health = classify(&input(Some(30), Some(5)), &policy);

        // then (期待する結果):
        assert_eq!(health, StreamHealth::Behind);
        let view = health.view(&policy);
        assert!(view.reload_stream);
        assert!(view.message.contains("180 seconds"));
    }

    #[test]
    fn test_classify_offline_is_always_ended() {
        // テスト項目: offline なら他の入力に関係なく ended
        let policy = HealthPolicy::default();
        for (server, local, epoch_changed) in [
            (None, None, true),
            (Some(30), Some(5), false),
            (Some(1), Some(10), true),
        ] {
            let input = HealthInput {
                online: false,
                server_segment: server,
                local_segment: local,
                epoch_changed,
                elapsed_since_load: Duration::ZERO,
            };
            assert_eq!(classify(&input, &policy), StreamHealth::Ended);
        }
    }

    #[test]
    fn test_classify_rule_order() {
        // テスト項目: 規則は上から順に評価され、最初に一致したものが採用される
        let policy = HealthPolicy::default();

        // (b) server segment 不明
        assert_eq!(classify(&input(None, Some(5)), &policy), StreamHealth::Restarted);

        // (c) epoch 変化は遅延判定より優先
        let mut restarted = input(Some(30), Some(5));
        restarted.epoch_changed = true;
        assert_eq!(classify(&restarted, &policy), StreamHealth::Restarted);

        // (d) local 不明かつタイムアウト経過
        assert_eq!(classify(&input(Some(30), None), &policy), StreamHealth::Unreachable);

        // (f) server が local より後ろ
        assert_eq!(classify(&input(Some(3), Some(5)), &policy), StreamHealth::Restarted);

        // (g) それ以外
        assert_eq!(classify(&input(Some(27), Some(5)), &policy), StreamHealth::Online);
    }

    #[test]
    fn test_classify_local_unknown_before_timeout_is_online() {
        // テスト項目: 再生開始待ちの間は online 扱い
        let policy = HealthPolicy::default();
        let mut starting = input(Some(30), None);
        starting.elapsed_since_load = Duration::from_secs(5);

        assert_eq!(classify(&starting, &policy), StreamHealth::Online);
    }

    #[test]
    fn test_classify_diff_exactly_at_threshold_is_behind() {
        // テスト項目: 差が閾値ちょうどでも behind になる
        let policy = HealthPolicy {
            segment_duration: Duration::from_secs(10),
            ..HealthPolicy::default()
        };
        assert_eq!(classify(&input(Some(18), Some(0)), &policy), StreamHealth::Behind);
        assert_eq!(classify(&input(Some(17), Some(0)), &policy), StreamHealth::Online);
    }

    #[test]
    fn test_views_flags() {
        // テスト項目: 各結果の表示色とリロード導線
        let policy = HealthPolicy::default();

        let ended = StreamHealth::Ended.view(&policy);
        assert_eq!(ended.indicator, Indicator::Red);
        assert!(!ended.reload_stream && !ended.reload_page);

        let online = StreamHealth::Online.view(&policy);
        assert_eq!(online.indicator, Indicator::Green);

        let failed = StreamHealth::RequestFailed.view(&policy);
        assert!(failed.reload_page && !failed.reload_stream);

        let unreachable = StreamHealth::Unreachable.view(&policy);
        assert!(unreachable.reload_page && !unreachable.reload_stream);

        let restarted = StreamHealth::Restarted.view(&policy);
        assert!(restarted.reload_stream && !restarted.reload_page);
    }

    #[test]
    fn test_epoch_tracker() {
        // テスト項目: 初回は基準値の記録のみ、以降は変化を検出する
        let mut tracker = EpochTracker::default();

        assert!(!tracker.observe(Some(100.0)));
        assert!(!tracker.observe(Some(100.0)));
        assert!(tracker.observe(None));
        assert!(tracker.observe(Some(200.0)));
        assert!(!tracker.observe(Some(200.0)));
    }
}
