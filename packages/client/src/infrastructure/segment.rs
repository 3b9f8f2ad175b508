//! Segment probes: how far this viewer has actually got in the stream.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::time::Instant;

use crate::domain::SegmentProbe;

/// Extract the segment number from a segment URI.
///
/// The number is the run of digits that ends the last path component once
/// its extension is removed, e.g. `/stream/segment1234.ts` → 1234.
pub fn segment_from_uri(uri: &str) -> Option<i64> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let file = path.rsplit('/').next()?;
    let stem = file.split('.').next().unwrap_or(file);
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    stem[digits_start..].parse().ok()
}

/// Newest segment listed by an HLS media playlist.
///
/// Prefers the number in the last segment URI and falls back to
/// `EXT-X-MEDIA-SEQUENCE + segment count - 1`.
pub fn segment_from_playlist(playlist: &str) -> Option<i64> {
    let mut media_sequence = 0i64;
    let mut count = 0i64;
    let mut last_uri = None;
    let mut expect_uri = false;

    for line in playlist.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value.trim().parse().ok()?;
        } else if line.starts_with("#EXTINF") {
            count += 1;
            expect_uri = true;
        } else if expect_uri && !line.is_empty() && !line.starts_with('#') {
            last_uri = Some(line);
            expect_uri = false;
        }
    }

    if count == 0 {
        return None;
    }
    last_uri
        .and_then(segment_from_uri)
        .or(Some(media_sequence + count - 1))
}

/// Reads the consumed segment from the stream's HLS playlist.
#[derive(Debug, Clone)]
pub struct PlaylistProbe {
    client: reqwest::Client,
    url: Url,
}

impl PlaylistProbe {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl SegmentProbe for PlaylistProbe {
    async fn current_segment(&self, _server_segment: i64) -> Option<i64> {
        let response = match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Playlist request was not successful");
                return None;
            }
            Err(e) => {
                tracing::debug!("Playlist request failed: {}", e);
                return None;
            }
        };
        let text = response.text().await.ok()?;
        segment_from_playlist(&text)
    }
}

/// Derives the consumed segment from playback time.
///
/// Playback starts at the server's segment the first time the probe is
/// asked and then progresses in real time. [`SegmentProbe::reload`] drops the
/// anchor so the next call starts over.
#[derive(Debug)]
pub struct PlaybackClockProbe {
    segment_duration: Duration,
    anchor: Mutex<Option<(i64, Instant)>>,
}

impl PlaybackClockProbe {
    pub fn new(segment_duration: Duration) -> Self {
        Self {
            segment_duration,
            anchor: Mutex::new(None),
        }
    }

    /// `first_segment + floor(played / segment_duration)`.
    pub fn segment_after(&self, first_segment: i64, played: Duration) -> Option<i64> {
        if self.segment_duration.is_zero() {
            return None;
        }
        let elapsed_segments = played.as_secs_f64() / self.segment_duration.as_secs_f64();
        Some(first_segment + elapsed_segments.floor() as i64)
    }

    fn anchor(&self) -> MutexGuard<'_, Option<(i64, Instant)>> {
        self.anchor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SegmentProbe for PlaybackClockProbe {
    async fn current_segment(&self, server_segment: i64) -> Option<i64> {
        let (first_segment, started_at) =
            *self.anchor().get_or_insert_with(|| (server_segment, Instant::now()));
        self.segment_after(first_segment, started_at.elapsed())
    }

    async fn reload(&self) {
        self.anchor().take();
    }
}
