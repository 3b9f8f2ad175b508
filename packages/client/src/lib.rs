//! Headless client for a Sajiki live stream.
//!
//! The client keeps a WebSocket chat session alive (reconnecting with
//! exponential backoff, answering the server keepalive and gating commands
//! on acknowledgements) and polls the heartbeat endpoint to report whether
//! the viewer is keeping up with the stream.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub use config::{Cli, ClientConfig};
pub use error::ClientError;
pub use ui::run;
