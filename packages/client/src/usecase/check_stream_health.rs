//! UseCase: ストリームの健全性チェック（ハートビート）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CheckStreamHealthUseCase::execute() メソッド
//! - ハートビート取得・セグメント取得・分類の流れ
//!
//! ### なぜこのテストが必要か
//! - 同時に実行されるハートビートは常に一つまで
//! - 取得失敗・タイムアウトは「到達不能」として表示する
//! - ストリームの再起動（開始時刻の変化）を検知する
//!
//! ### どのような状況を想定しているか
//! - 正常系：オンライン、遅延なし
//! - 異常系：リクエスト失敗、タイムアウト、実行中の再実行

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};

use crate::domain::{
    EpochTracker, HealthInput, HealthPolicy, HeartbeatSnapshot, HeartbeatSource, SegmentProbe,
    SourceError, StatusView, StreamHealth, classify,
};

/// 既定のハートビート要求タイムアウト
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(18);

/// 一回のハートビートの結果
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub health: StreamHealth,
    pub view: StatusView,
    /// 取得に成功した場合のスナップショット
    pub snapshot: Option<HeartbeatSnapshot>,
    /// 取得完了時刻
    pub observed_at: Instant,
}

impl HealthReport {
    /// `now` 時点での配信経過時間（秒）
    ///
    /// スナップショットの `start_rel` に取得後の経過時間を足したもの。
    pub fn uptime_at(&self, now: Instant) -> Option<u64> {
        let start_rel = self.snapshot.as_ref()?.start_rel?;
        if !start_rel.is_finite() || start_rel < 0.0 {
            return None;
        }
        let since = now.saturating_duration_since(self.observed_at).as_secs();
        Some(start_rel.floor() as u64 + since)
    }
}

/// `execute()` の結果
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    /// 前回のハートビートが実行中のため何もしなかった
    Skipped,
    Checked(HealthReport),
}

/// 実行中フラグを解放するガード
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// ストリーム健全性チェックのユースケース
pub struct CheckStreamHealthUseCase {
    /// ハートビートの取得元
    source: Arc<dyn HeartbeatSource>,
    /// 視聴中のセグメントの取得元（無ければ常に不明）
    probe: Option<Arc<dyn SegmentProbe>>,
    policy: HealthPolicy,
    request_timeout: Duration,
    /// クライアント起動時刻
    loaded_at: Instant,
    in_flight: AtomicBool,
    epoch: Mutex<EpochTracker>,
}

impl CheckStreamHealthUseCase {
    /// 新しい CheckStreamHealthUseCase を作成
    ///
    /// # Arguments
    ///
    /// * `source` - ハートビートの取得元
    /// * `probe` - 視聴中セグメントの取得元
    /// * `policy` - 分類の閾値
    /// * `request_timeout` - 一回の取得のタイムアウト
    pub fn new(
        source: Arc<dyn HeartbeatSource>,
        probe: Option<Arc<dyn SegmentProbe>>,
        policy: HealthPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            probe,
            policy,
            request_timeout,
            loaded_at: Instant::now(),
            in_flight: AtomicBool::new(false),
            epoch: Mutex::new(EpochTracker::default()),
        }
    }

    /// ハートビートを一回実行する
    ///
    /// # Returns
    ///
    /// * `HeartbeatOutcome::Skipped` - 前回のハートビートがまだ実行中
    /// * `HeartbeatOutcome::Checked` - 分類結果
    pub async fn execute(&self) -> HeartbeatOutcome {
        // 1. 同時実行の防止
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!("Previous heartbeat still in flight, skipping");
            return HeartbeatOutcome::Skipped;
        };

        // 2. 取得から分類までを一つの期限内で実行
        match timeout(self.request_timeout, self.check()).await {
            Ok(Ok((health, snapshot))) => {
                HeartbeatOutcome::Checked(self.report(health, Some(snapshot)))
            }
            Ok(Err(e)) => {
                tracing::warn!("Heartbeat request failed: {}", e);
                HeartbeatOutcome::Checked(self.report(StreamHealth::RequestFailed, None))
            }
            Err(_) => {
                tracing::warn!(
                    "Heartbeat request timed out after {:?}",
                    self.request_timeout
                );
                HeartbeatOutcome::Checked(self.report(StreamHealth::RequestFailed, None))
            }
        }
    }

    /// ハートビートの取得・セグメント取得・分類
    async fn check(&self) -> Result<(StreamHealth, HeartbeatSnapshot), SourceError> {
        // 1. ハートビートの取得
        let snapshot = self.source.fetch().await?;

        // 2. 開始時刻の変化を記録
        let epoch_changed = self.epoch.lock().await.observe(snapshot.start_abs);

        // 3. 視聴中セグメントの取得（比較が必要な場合のみ）
        let local_segment = match (&self.probe, snapshot.current_segment) {
            (Some(probe), Some(server_segment)) if snapshot.online && !epoch_changed => {
                probe.current_segment(server_segment).await
            }
            _ => None,
        };

        // 4. 分類
        let input = HealthInput {
            online: snapshot.online,
            server_segment: snapshot.current_segment,
            local_segment,
            epoch_changed,
            elapsed_since_load: self.loaded_at.elapsed(),
        };
        let health = classify(&input, &self.policy);
        tracing::debug!(?health, ?input, "Classified heartbeat");

        Ok((health, snapshot))
    }

    /// ストリームを再読み込みする（視聴位置を最新に戻す）
    pub async fn reload_stream(&self) {
        if let Some(probe) = &self.probe {
            tracing::info!("Reloading the stream");
            probe.reload().await;
        }
    }

    fn report(&self, health: StreamHealth, snapshot: Option<HeartbeatSnapshot>) -> HealthReport {
        HealthReport {
            health,
            view: health.view(&self.policy),
            snapshot,
            observed_at: Instant::now(),
        }
    }
}
