use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::{
    config::{ClientConfig, HeartbeatConfig},
    domain::SegmentProbe,
    error::ClientError,
    infrastructure::{HttpHeartbeatSource, PlaybackClockProbe, PlaylistProbe},
    ui::{
        console::Console, heartbeat::run_heartbeat, input::spawn_input, session::SessionRunner,
        signal::shutdown_signal,
    },
    usecase::CheckStreamHealthUseCase,
};

const COMMAND_BUFFER: usize = 32;

fn health_usecase(
    config: &HeartbeatConfig,
    token: &str,
    http: &reqwest::Client,
) -> CheckStreamHealthUseCase {
    let source = HttpHeartbeatSource::new(http.clone(), config.url.clone(), token.to_string());
    let probe: Arc<dyn SegmentProbe> = match &config.playlist {
        Some(url) => {
            tracing::info!("Reading the watched segment from {}", url);
            Arc::new(PlaylistProbe::new(http.clone(), url.clone()))
        }
        None => Arc::new(PlaybackClockProbe::new(config.policy.segment_duration)),
    };
    CheckStreamHealthUseCase::new(
        Arc::new(source),
        Some(probe),
        config.policy,
        config.request_timeout,
    )
}

/// Run the client until the user quits or a shutdown signal arrives.
pub async fn run(config: ClientConfig) -> Result<(), ClientError> {
    tracing::info!("Starting client for {}", config.server);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (report_tx, report_rx) = watch::channel(None);
    let console = Console::new(config.server.clone());

    let heartbeat_task = match &config.heartbeat {
        Some(heartbeat) => {
            let http = reqwest::Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()?;
            let usecase = Arc::new(health_usecase(heartbeat, &config.token, &http));
            let mut status_console = console.clone();
            Some(tokio::spawn(run_heartbeat(
                usecase,
                heartbeat.period,
                report_tx,
                move |report| status_console.show_health(report),
                shutdown_rx.clone(),
            )))
        }
        None => {
            tracing::info!("Heartbeat disabled");
            None
        }
    };

    spawn_input(command_tx, report_rx, console.clone())?;

    let session = SessionRunner::new(config.live_url, config.backoff, config.ping_grace, console)
        .with_connect_timeout(config.connect_timeout);
    let mut session_task = tokio::spawn(session.run(command_rx, shutdown_rx));

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut session_task => {
            if let Err(e) = result {
                tracing::error!("Session task failed: {}", e);
            }
        }
    }

    shutdown_tx.send_replace(true);
    if !session_task.is_finished()
        && let Err(e) = session_task.await
    {
        tracing::error!("Session task failed: {}", e);
    }
    if let Some(task) = heartbeat_task
        && let Err(e) = task.await
    {
        tracing::error!("Heartbeat task failed: {}", e);
    }

    tracing::info!("Client stopped");
    Ok(())
}
