use chrono::{DateTime, Local, Utc};

/// Convert a Unix timestamp in (fractional) seconds to RFC 3339 in UTC.
///
/// Returns `None` when the value is not finite or out of chrono's range.
pub fn unix_seconds_to_rfc3339(seconds: f64) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

/// Current local wall-clock time as `HH:MM:SS`.
pub fn local_clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Render an uptime in whole seconds the way the stream page does.
///
/// `mm:ss` below one hour, `h:mm:ss` below 1000 hours, `1000+ hours` beyond.
pub fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours == 0 {
        format!("{minutes:02}:{seconds:02}")
    } else if hours < 1000 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        "1000+ hours".to_string()
    }
}
