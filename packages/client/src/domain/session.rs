//! Chat session state machine.
//!
//! [`SessionState`] owns every piece of client-side chat state. Inbound
//! server messages arrive as [`InboundEvent`] values and are dispatched by
//! [`SessionState::apply`], which returns the [`SessionEffect`]s the caller
//! must carry out (replies, keepalive bookkeeping, forced reload, UI updates).
//! Each event kind touches its own slice of state and replaying an event does
//! not corrupt it.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::{
    entity::{ChatMessage, DefaultNames, MessageLog, Roster, StreamStats, User},
    error::SessionError,
    value_object::{CaptchaDigest, Color, Comment, Nonce, Seq, TokenHash},
};

/// Lifecycle of the single WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in progress
    Connecting,
    /// The connection is open
    Open,
    /// No connection; the next attempt starts after `delay`
    Retrying { delay: Duration },
}

impl ConnectionState {
    fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Retrying { .. } => "retrying",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting to chat..."),
            Self::Open => f.write_str("Connected to chat"),
            Self::Retrying { delay } => write!(
                f,
                "Disconnected from chat, retrying in {:.0}s",
                delay.as_secs_f64()
            ),
        }
    }
}

/// Full state sent by the server right after connecting.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nonce: Nonce,
    pub title: String,
    pub stats: Option<StreamStats>,
    pub messages: Vec<ChatMessage>,
    pub users: HashMap<TokenHash, User>,
    pub default_names: DefaultNames,
    pub scrollback: usize,
    pub captcha: Option<CaptchaDigest>,
    pub ping_interval: Option<Duration>,
}

/// Server acknowledgement of a chat message command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Nonce of the command being acknowledged
    pub nonce: Nonce,
    /// Nonce to use for the next command
    pub next: Nonce,
    pub notice: Option<String>,
    /// Whether the message was accepted and the draft can be cleared
    pub clear: bool,
    pub captcha: Option<CaptchaDigest>,
}

/// Name and colour confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    pub name: Option<String>,
    pub color: Color,
}

/// Server messages, as a closed set.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Init(Box<Snapshot>),
    Title(String),
    Info {
        title: Option<String>,
        /// `Some(None)` means the stream went offline
        stats: Option<Option<StreamStats>>,
    },
    Ack(Acknowledgement),
    Reject {
        notice: String,
    },
    Error {
        because: String,
    },
    Message(ChatMessage),
    Delete(Vec<Seq>),
    SetUsers(HashMap<TokenHash, User>),
    RemoveUsers(Vec<TokenHash>),
    Captcha(Option<CaptchaDigest>),
    Appearance(Result<Appearance, Vec<String>>),
    Ping,
    Kick,
}

/// Appearance change requested by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppearanceForm {
    pub name: String,
    pub color: Color,
    /// Tripcode password; empty means no tripcode
    pub password: String,
}

/// Answer to the current captcha challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaAnswer {
    pub digest: CaptchaDigest,
    pub answer: String,
}

/// Commands sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    Message {
        nonce: Nonce,
        comment: Comment,
        captcha: Option<CaptchaAnswer>,
    },
    Appearance {
        nonce: Nonce,
        form: AppearanceForm,
    },
    Pong,
    RequestCaptcha,
}

/// Something the presentation layer may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Connection(ConnectionState),
    Snapshot { appended: Vec<ChatMessage> },
    Title(String),
    Stats(Option<StreamStats>),
    Message(ChatMessage),
    Deleted(Vec<Seq>),
    Roster,
    Acknowledged { clear: bool },
    Notice(String),
    Captcha(CaptchaDigest),
    AppearanceChanged(Appearance),
    AppearanceRejected(Vec<String>),
}

/// What the caller must do after [`SessionState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Send this command right away
    Reply(OutboundCommand),
    /// A keepalive ping was received
    PingSeen,
    /// The server declared its ping interval
    PingInterval(Duration),
    /// Drop everything and reconnect without backoff
    ForceReload,
    /// Notify the presentation layer
    Update(SessionUpdate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Pending {
    message: bool,
    appearance: bool,
}

/// All client-side chat state.
#[derive(Debug, Clone)]
pub struct SessionState {
    connection: ConnectionState,
    nonce: Option<Nonce>,
    title: String,
    stats: Option<StreamStats>,
    roster: Roster,
    messages: MessageLog,
    default_names: DefaultNames,
    captcha: Option<CaptchaDigest>,
    appearance: Option<Appearance>,
    pending: Pending,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Fresh state; the first connection attempt may start immediately.
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Retrying {
                delay: Duration::ZERO,
            },
            nonce: None,
            title: String::new(),
            stats: None,
            roster: Roster::default(),
            messages: MessageLog::default(),
            default_names: DefaultNames::default(),
            captcha: None,
            appearance: None,
            pending: Pending::default(),
        }
    }

    /// Forget everything, as after a forced reload.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stats(&self) -> Option<&StreamStats> {
        self.stats.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn default_names(&self) -> &DefaultNames {
        &self.default_names
    }

    pub fn captcha(&self) -> Option<&CaptchaDigest> {
        self.captcha.as_ref()
    }

    pub fn appearance(&self) -> Option<&Appearance> {
        self.appearance.as_ref()
    }

    /// Display name of the author of `message`.
    pub fn author_name(&self, token_hash: &TokenHash) -> &str {
        match self.roster.get(token_hash) {
            Some(user) => self.default_names.display_name(user),
            None => &self.default_names.anonymous,
        }
    }

    /// Start a connection attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyConnected` while a connection is
    /// connecting or open; the existing one is left untouched.
    pub fn begin_connecting(&mut self) -> Result<(), SessionError> {
        match self.connection {
            ConnectionState::Connecting | ConnectionState::Open => {
                Err(SessionError::AlreadyConnected(self.connection.label()))
            }
            ConnectionState::Retrying { .. } => {
                self.connection = ConnectionState::Connecting;
                Ok(())
            }
        }
    }

    /// The connection opened.
    pub fn on_open(&mut self) {
        self.connection = ConnectionState::Open;
        self.pending = Pending::default();
    }

    /// The connection closed (or never opened); retry after `delay`.
    ///
    /// Outstanding submissions can no longer be acknowledged, so they are
    /// dropped.
    pub fn on_closed(&mut self, delay: Duration) {
        self.connection = ConnectionState::Retrying { delay };
        self.pending = Pending::default();
    }

    /// Whether the chat submit control is enabled.
    pub fn can_submit_message(&self) -> bool {
        self.connection == ConnectionState::Open && !self.pending.message
    }

    /// Whether the appearance submit control is enabled.
    pub fn can_submit_appearance(&self) -> bool {
        self.connection == ConnectionState::Open && !self.pending.appearance
    }

    /// Build a chat command and disable the chat submit control.
    ///
    /// The current captcha challenge, if any, is attached together with
    /// `captcha_answer` (empty when none was given).
    pub fn begin_message(
        &mut self,
        comment: Comment,
        captcha_answer: Option<String>,
    ) -> Result<OutboundCommand, SessionError> {
        let nonce = self.ready_nonce(self.pending.message, "message")?;
        let captcha = self.captcha.clone().map(|digest| CaptchaAnswer {
            digest,
            answer: captcha_answer.unwrap_or_default(),
        });
        self.pending.message = true;
        Ok(OutboundCommand::Message {
            nonce,
            comment,
            captcha,
        })
    }

    /// Build an appearance command and disable the appearance submit control.
    pub fn begin_appearance(
        &mut self,
        form: AppearanceForm,
    ) -> Result<OutboundCommand, SessionError> {
        let nonce = self.ready_nonce(self.pending.appearance, "appearance change")?;
        self.pending.appearance = true;
        Ok(OutboundCommand::Appearance { nonce, form })
    }

    fn ready_nonce(&self, pending: bool, kind: &'static str) -> Result<Nonce, SessionError> {
        if self.connection != ConnectionState::Open {
            return Err(SessionError::NotConnected);
        }
        if pending {
            return Err(SessionError::AwaitingAcknowledgement(kind));
        }
        self.nonce.clone().ok_or(SessionError::NoNonce)
    }

    /// Dispatch one server message.
    pub fn apply(&mut self, event: InboundEvent) -> Vec<SessionEffect> {
        use SessionEffect::{ForceReload, PingInterval, PingSeen, Reply, Update};

        match event {
            InboundEvent::Init(snapshot) => {
                let Snapshot {
                    nonce,
                    title,
                    stats,
                    messages,
                    users,
                    default_names,
                    scrollback,
                    captcha,
                    ping_interval,
                } = *snapshot;

                self.nonce = Some(nonce);
                self.title = title;
                self.stats = stats;
                self.messages.set_scrollback(scrollback);
                let appended = self.messages.synchronize(messages);
                self.roster.replace_all(users);
                self.default_names = default_names;
                self.captcha = captcha;
                self.pending = Pending::default();

                let mut effects = Vec::with_capacity(2);
                if let Some(interval) = ping_interval {
                    effects.push(PingInterval(interval));
                }
                effects.push(Update(SessionUpdate::Snapshot { appended }));
                effects
            }
            InboundEvent::Title(title) => {
                self.title = title.clone();
                vec![Update(SessionUpdate::Title(title))]
            }
            InboundEvent::Info { title, stats } => {
                let mut effects = Vec::new();
                if let Some(title) = title {
                    self.title = title.clone();
                    effects.push(Update(SessionUpdate::Title(title)));
                }
                if let Some(stats) = stats {
                    self.stats = stats;
                    effects.push(Update(SessionUpdate::Stats(stats)));
                }
                effects
            }
            InboundEvent::Ack(ack) => {
                let matched = self.nonce.as_ref() == Some(&ack.nonce);
                self.nonce = Some(ack.next);
                self.pending.message = false;
                self.captcha = ack.captcha;

                let mut effects = vec![Update(SessionUpdate::Acknowledged {
                    clear: matched && ack.clear,
                })];
                if let Some(notice) = ack.notice {
                    effects.push(Update(SessionUpdate::Notice(notice)));
                }
                effects
            }
            InboundEvent::Reject { notice } => {
                self.pending = Pending::default();
                vec![Update(SessionUpdate::Notice(notice))]
            }
            InboundEvent::Error { because } => {
                self.pending = Pending::default();
                vec![Update(SessionUpdate::Notice(format!(
                    "The server rejected the last command: {because}"
                )))]
            }
            InboundEvent::Message(message) => {
                if self.messages.append(message.clone()) {
                    vec![Update(SessionUpdate::Message(message))]
                } else {
                    Vec::new()
                }
            }
            InboundEvent::Delete(seqs) => {
                let removed = self.messages.delete(&seqs);
                if removed.is_empty() {
                    Vec::new()
                } else {
                    vec![Update(SessionUpdate::Deleted(removed))]
                }
            }
            InboundEvent::SetUsers(users) => {
                self.roster.set_users(users);
                vec![Update(SessionUpdate::Roster)]
            }
            InboundEvent::RemoveUsers(token_hashes) => {
                self.roster.remove_users(&token_hashes);
                vec![Update(SessionUpdate::Roster)]
            }
            InboundEvent::Captcha(digest) => {
                self.captcha = digest.clone();
                match digest {
                    Some(digest) => vec![Update(SessionUpdate::Captcha(digest))],
                    None => Vec::new(),
                }
            }
            InboundEvent::Appearance(result) => {
                self.pending.appearance = false;
                match result {
                    Ok(appearance) => {
                        self.appearance = Some(appearance.clone());
                        vec![Update(SessionUpdate::AppearanceChanged(appearance))]
                    }
                    Err(errors) => vec![Update(SessionUpdate::AppearanceRejected(errors))],
                }
            }
            InboundEvent::Ping => vec![Reply(OutboundCommand::Pong), PingSeen],
            InboundEvent::Kick => vec![ForceReload],
        }
    }
}
