//! Fixed-period heartbeat loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};

use crate::usecase::{CheckStreamHealthUseCase, HealthReport, HeartbeatOutcome};

/// Run a heartbeat every `period` until `shutdown` fires.
///
/// Each tick runs on its own task so that a slow request never delays the
/// timer; the use case turns ticks that overlap a running request into
/// no-ops. Every report is handed to `on_report` and published on `reports`.
pub async fn run_heartbeat<F>(
    usecase: Arc<CheckStreamHealthUseCase>,
    period: Duration,
    reports: watch::Sender<Option<HealthReport>>,
    mut on_report: F,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FnMut(&HealthReport) + Send,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (done_tx, mut done_rx) = mpsc::channel::<HealthReport>(4);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let usecase = usecase.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    if let HeartbeatOutcome::Checked(report) = usecase.execute().await {
                        // The loop is gone once shutdown was requested.
                        let _ = done_tx.send(report).await;
                    }
                });
            }
            Some(report) = done_rx.recv() => {
                tracing::debug!(health = ?report.health, "Heartbeat finished");
                if report.view.reload_stream {
                    usecase.reload_stream().await;
                }
                on_report(&report);
                reports.send_replace(Some(report));
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Heartbeat loop stopped");
}
