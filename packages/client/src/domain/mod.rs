//! Domain layer for the stream client.
//!
//! This module contains the session state machine and the pure policies
//! (backoff, keepalive, health classification, styling) that are independent
//! of data transfer objects (DTOs) and infrastructure concerns.

pub mod backoff;
pub mod entity;
pub mod error;
pub mod health;
pub mod keepalive;
pub mod repository;
pub mod session;
pub mod style;
pub mod value_object;

pub use backoff::{Backoff, BackoffPolicy};
pub use entity::{
    ChatMessage, DefaultNames, MessageLog, Roster, StreamStats, Tripcode, User, Watching,
};
pub use error::{SessionError, SourceError, ValueObjectError};
pub use health::{
    EpochTracker, HealthInput, HealthPolicy, HeartbeatSnapshot, Indicator, StatusView,
    StreamHealth, classify,
};
pub use keepalive::KeepAlive;
pub use repository::{HeartbeatSource, SegmentProbe};
pub use session::{
    Acknowledgement, Appearance, AppearanceForm, CaptchaAnswer, ConnectionState, InboundEvent,
    OutboundCommand, SessionEffect, SessionState, SessionUpdate, Snapshot,
};
pub use style::{UserStyle, style_map};
pub use value_object::{CaptchaDigest, Color, Comment, Nonce, Seq, TokenHash};
