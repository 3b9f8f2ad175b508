//! Ports to the outside world used by the health use case.
//!
//! The domain defines these traits; infrastructure provides the HTTP-backed
//! implementations, and tests substitute mocks.

use async_trait::async_trait;

use super::{error::SourceError, health::HeartbeatSnapshot};

/// Source of heartbeat snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeartbeatSource: Send + Sync {
    /// Fetch the current stream health from the server.
    async fn fetch(&self) -> Result<HeartbeatSnapshot, SourceError>;
}

/// Reports which segment this viewer has actually consumed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SegmentProbe: Send + Sync {
    /// Latest consumed segment, `None` when playback has not started or the
    /// backend cannot tell.
    ///
    /// `server_segment` is what the server publishes right now; backends
    /// without a reference point of their own anchor playback to it.
    async fn current_segment(&self, server_segment: i64) -> Option<i64>;

    /// Start playback over, as when the viewer reloads the stream.
    async fn reload(&self) {}
}
