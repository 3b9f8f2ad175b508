//! Infrastructure layer: wire formats and network adapters.

pub mod dto;
pub mod heartbeat;
pub mod segment;
pub mod websocket;

pub use heartbeat::HttpHeartbeatSource;
pub use segment::{PlaybackClockProbe, PlaylistProbe, segment_from_playlist, segment_from_uri};
pub use websocket::{DEFAULT_CONNECT_TIMEOUT, Frame, LiveConnection, TransportError, live_url};
