//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// Nonce validation error
    #[error("Nonce cannot be empty")]
    NonceEmpty,

    /// TokenHash validation error
    #[error("TokenHash cannot be empty")]
    TokenHashEmpty,

    /// Color format error (expects `#rrggbb`)
    #[error("Color must be of the form #rrggbb (got: {0})")]
    ColorInvalidFormat(String),

    /// CaptchaDigest validation error
    #[error("CaptchaDigest cannot be empty")]
    CaptchaDigestEmpty,

    /// Comment too long error
    #[error("Comment cannot exceed {max} characters (got {actual})")]
    CommentTooLong { max: usize, actual: usize },
}

/// Errors reported by a heartbeat source
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The request could not be sent or the connection failed
    #[error("Heartbeat request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("Heartbeat returned HTTP status {0}")]
    Status(u16),

    /// The body was not a valid heartbeat response
    #[error("Heartbeat response could not be decoded: {0}")]
    Decode(String),
}

/// Errors raised by the session state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A connection is already connecting or open
    #[error("Refusing to open another connection while one is {0}")]
    AlreadyConnected(&'static str),

    /// Commands can only be submitted over an open connection
    #[error("Not connected to chat")]
    NotConnected,

    /// The server has not issued a nonce yet
    #[error("No nonce has been received from the server yet")]
    NoNonce,

    /// A previous command of the same kind has not been acknowledged yet
    #[error("Still waiting for the server to acknowledge the previous {0}")]
    AwaitingAcknowledgement(&'static str),
}
