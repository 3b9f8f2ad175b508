//! Live chat session loop.
//!
//! One task owns the [`SessionState`] and the socket. It waits on socket
//! frames, user commands, the stale-ping deadline and shutdown, and handles
//! each event to completion before taking the next one.

use std::future;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

use crate::{
    domain::{
        Backoff, BackoffPolicy, InboundEvent, KeepAlive, OutboundCommand, SessionEffect,
        SessionError, SessionState, SessionUpdate,
    },
    infrastructure::{DEFAULT_CONNECT_TIMEOUT, Frame, LiveConnection, TransportError},
    usecase::{ChangeAppearanceUseCase, SubmitError, SubmitMessageUseCase},
};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Send a chat message
    Say(String),
    /// Answer the captcha challenge without a comment
    Answer(String),
    /// Change name, colour and tripcode
    Appearance {
        name: String,
        color: String,
        password: String,
    },
    /// Ask the server for a new captcha challenge
    RequestCaptcha,
    /// Show who is in the chat
    ShowUsers,
}

/// Receives everything the session wants to show.
pub trait Presenter: Send {
    /// A state change caused by the server or the connection.
    fn present(&mut self, update: &SessionUpdate, state: &SessionState);

    /// A command could not be sent.
    fn submit_failed(&mut self, error: &SubmitError);

    /// The user asked for the roster.
    fn show_users(&mut self, state: &SessionState);
}

/// Why [`SessionRunner::drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Closed,
    Kicked,
    Shutdown,
}

/// One step of the open-connection loop.
enum Step {
    Frame(Result<Frame, TransportError>),
    Command(Option<UserCommand>),
    Stale,
    Shutdown,
}

/// Keeps one live connection alive until shutdown.
pub struct SessionRunner<P> {
    url: Url,
    state: SessionState,
    backoff: Backoff,
    keepalive: KeepAlive,
    ping_grace: Duration,
    connect_timeout: Duration,
    presenter: P,
    captcha_answer: Option<String>,
}

impl<P: Presenter> SessionRunner<P> {
    /// Create a runner for the `/live` endpoint at `url`.
    pub fn new(url: Url, backoff: BackoffPolicy, ping_grace: Duration, presenter: P) -> Self {
        Self {
            url,
            state: SessionState::new(),
            backoff: Backoff::new(backoff),
            keepalive: KeepAlive::new(ping_grace),
            ping_grace,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            presenter,
            captcha_answer: None,
        }
    }

    /// Give up on a connection attempt after `connect_timeout`.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Connect, reconnect with backoff, and process events until `shutdown`
    /// fires or the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<UserCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if let Err(e) = self.state.begin_connecting() {
                tracing::warn!("Refusing to open a second connection: {}", e);
                return;
            }
            self.show_connection();
            tracing::info!("Connecting to {}", self.url);

            let connected = tokio::select! {
                result = LiveConnection::connect(&self.url, self.connect_timeout) => result,
                _ = shutdown.changed() => return,
            };

            let (exit, open_for) = match connected {
                Ok(connection) => {
                    let opened_at = Instant::now();
                    self.state.on_open();
                    self.show_connection();
                    tracing::info!("Connected to chat");
                    let exit = self.drive(connection, &mut commands, &mut shutdown).await;
                    (exit, Some(opened_at.elapsed()))
                }
                Err(e) => {
                    tracing::warn!("Failed to connect: {}", e);
                    (Exit::Closed, None)
                }
            };

            match exit {
                Exit::Shutdown => return,
                Exit::Kicked => {
                    tracing::warn!("Server forced a reload, reconnecting immediately");
                    self.state.reset();
                    self.backoff.reset();
                    self.keepalive = KeepAlive::new(self.ping_grace);
                    self.captcha_answer = None;
                }
                Exit::Closed => {
                    let delay = self.backoff.record_close(open_for);
                    self.state.on_closed(delay);
                    self.show_connection();
                    tracing::info!(
                        failures = self.backoff.failures(),
                        "Disconnected, retrying in {:?}",
                        delay
                    );
                    if self.wait_retry(delay, &mut commands, &mut shutdown).await == Exit::Shutdown {
                        return;
                    }
                }
            }
        }
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    async fn drive(
        &mut self,
        mut connection: LiveConnection,
        commands: &mut mpsc::Receiver<UserCommand>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        let mut last_ping = Instant::now();

        let exit = loop {
            let stale_at = self.keepalive.threshold().and_then(|threshold| {
                last_ping.checked_add(threshold.saturating_add(Duration::from_millis(1)))
            });
            let stale = async move {
                match stale_at {
                    Some(deadline) => sleep_until(deadline).await,
                    None => future::pending().await,
                }
            };

            let step = tokio::select! {
                frame = connection.next_frame() => Step::Frame(frame),
                command = commands.recv() => Step::Command(command),
                () = stale => Step::Stale,
                _ = shutdown.changed() => Step::Shutdown,
            };

            match step {
                Step::Frame(Ok(Frame::Event(event))) => {
                    match self.handle_event(event, &mut connection, &mut last_ping).await {
                        Ok(None) => {}
                        Ok(Some(exit)) => break exit,
                        Err(e) => {
                            tracing::warn!("Failed to reply to the server: {}", e);
                            break Exit::Closed;
                        }
                    }
                }
                Step::Frame(Ok(Frame::Malformed { text, error })) => {
                    tracing::warn!("Ignoring malformed server message ({}): {}", error, text);
                }
                Step::Frame(Ok(Frame::Closed)) => break Exit::Closed,
                Step::Frame(Err(e)) => {
                    tracing::warn!("Connection error: {}", e);
                    break Exit::Closed;
                }
                Step::Command(Some(command)) => {
                    if let Err(e) = self.handle_command(command, Some(&mut connection)).await {
                        tracing::warn!("Failed to send command: {}", e);
                        break Exit::Closed;
                    }
                }
                Step::Command(None) | Step::Shutdown => break Exit::Shutdown,
                Step::Stale => {
                    if self.keepalive.is_stale(last_ping.elapsed()) {
                        tracing::warn!(
                            "No ping from the server for {:?}, closing connection",
                            last_ping.elapsed()
                        );
                        break Exit::Closed;
                    }
                }
            }
        };

        connection.close().await;
        exit
    }

    async fn handle_event(
        &mut self,
        event: InboundEvent,
        connection: &mut LiveConnection,
        last_ping: &mut Instant,
    ) -> Result<Option<Exit>, TransportError> {
        for effect in self.state.apply(event) {
            match effect {
                SessionEffect::Reply(command) => connection.send(command).await?,
                SessionEffect::PingSeen => *last_ping = Instant::now(),
                SessionEffect::PingInterval(interval) => {
                    tracing::debug!("Server ping interval is {:?}", interval);
                    self.keepalive.set_interval(interval);
                    *last_ping = Instant::now();
                }
                SessionEffect::ForceReload => return Ok(Some(Exit::Kicked)),
                SessionEffect::Update(update) => {
                    if matches!(update, SessionUpdate::Acknowledged { clear: true }) {
                        self.captcha_answer = None;
                    }
                    self.presenter.present(&update, &self.state);
                }
            }
        }
        Ok(None)
    }

    /// Sleep for `delay` while still answering user commands.
    async fn wait_retry(
        &mut self,
        delay: Duration,
        commands: &mut mpsc::Receiver<UserCommand>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        let wake_at = Instant::now() + delay;
        loop {
            tokio::select! {
                () = sleep_until(wake_at) => return Exit::Closed,
                command = commands.recv() => match command {
                    Some(command) => {
                        // Without a connection nothing is sent, so this cannot fail.
                        let _ = self.handle_command(command, None).await;
                    }
                    None => return Exit::Shutdown,
                },
                _ = shutdown.changed() => return Exit::Shutdown,
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: UserCommand,
        connection: Option<&mut LiveConnection>,
    ) -> Result<(), TransportError> {
        let outbound = match command {
            UserCommand::Say(text) => {
                SubmitMessageUseCase::new().execute(&mut self.state, text, self.captcha_answer.clone())
            }
            UserCommand::Answer(answer) => {
                self.captcha_answer = Some(answer);
                SubmitMessageUseCase::new().execute(
                    &mut self.state,
                    String::new(),
                    self.captcha_answer.clone(),
                )
            }
            UserCommand::Appearance {
                name,
                color,
                password,
            } => ChangeAppearanceUseCase::new().execute(&mut self.state, &name, &color, password),
            UserCommand::RequestCaptcha if connection.is_some() => {
                Ok(OutboundCommand::RequestCaptcha)
            }
            UserCommand::RequestCaptcha => Err(SessionError::NotConnected.into()),
            UserCommand::ShowUsers => {
                self.presenter.show_users(&self.state);
                return Ok(());
            }
        };

        match (outbound, connection) {
            (Ok(command), Some(connection)) => connection.send(command).await,
            (Ok(_), None) => Ok(()),
            (Err(e), _) => {
                tracing::debug!("Command not sent: {}", e);
                self.presenter.submit_failed(&e);
                Ok(())
            }
        }
    }

    fn show_connection(&mut self) {
        let update = SessionUpdate::Connection(self.state.connection());
        self.presenter.present(&update, &self.state);
    }
}

