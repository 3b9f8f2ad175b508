//! Command-line options and validated client configuration.

use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

use crate::{
    domain::{
        BackoffPolicy, HealthPolicy,
        backoff::{DEFAULT_BACKOFF_CEILING, DEFAULT_BACKOFF_FLOOR, DEFAULT_STABLE_AFTER},
        health::{DEFAULT_LATENCY_THRESHOLD, DEFAULT_PLAYBACK_TIMEOUT, DEFAULT_SEGMENT_DURATION},
        keepalive::DEFAULT_PING_GRACE,
    },
    infrastructure::{DEFAULT_CONNECT_TIMEOUT, TransportError, live_url},
    usecase::check_stream_health::DEFAULT_REQUEST_TIMEOUT,
};

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(20);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("--{name} must be a non-negative number of seconds, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("--{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Heartbeat timeout ({timeout:?}) must be shorter than the period ({period:?})")]
    TimeoutNotShorterThanPeriod { timeout: Duration, period: Duration },

    #[error("Backoff floor ({floor:?}) must not exceed the ceiling ({ceiling:?})")]
    BackoffFloorAboveCeiling { floor: Duration, ceiling: Duration },

    #[error("Token cannot be empty")]
    EmptyToken,
}

/// Headless chat and stream-health client.
#[derive(Debug, Clone, Parser)]
#[command(name = "sajiki-client", version, about)]
pub struct Cli {
    /// Base URL of the stream site
    #[arg(short, long, default_value = "http://127.0.0.1:5051/")]
    pub server: String,

    /// Viewer token (a random one is generated when omitted)
    #[arg(short, long)]
    pub token: Option<String>,

    /// Preferred language sent to the chat endpoint
    #[arg(long)]
    pub lang: Option<String>,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_PERIOD.as_secs_f64())]
    pub heartbeat_period: f64,

    /// Seconds before a heartbeat request is abandoned
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs_f64())]
    pub heartbeat_timeout: f64,

    /// Seconds after start by which playback must have begun
    #[arg(long, default_value_t = DEFAULT_PLAYBACK_TIMEOUT.as_secs_f64())]
    pub playback_timeout: f64,

    /// Duration of one stream segment in seconds
    #[arg(long, default_value_t = DEFAULT_SEGMENT_DURATION.as_secs_f64())]
    pub segment_duration: f64,

    /// Seconds of latency after which the viewer is told to reload
    #[arg(long, default_value_t = DEFAULT_LATENCY_THRESHOLD.as_secs_f64())]
    pub latency_threshold: f64,

    /// Extra seconds allowed beyond 1.5 ping intervals
    #[arg(long, default_value_t = DEFAULT_PING_GRACE.as_secs_f64())]
    pub ping_grace: f64,

    /// Seconds allowed for connecting to the chat before retrying
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs_f64())]
    pub connect_timeout: f64,

    /// First reconnect delay in seconds
    #[arg(long, default_value_t = DEFAULT_BACKOFF_FLOOR.as_secs_f64())]
    pub backoff_floor: f64,

    /// Longest reconnect delay in seconds
    #[arg(long, default_value_t = DEFAULT_BACKOFF_CEILING.as_secs_f64())]
    pub backoff_ceiling: f64,

    /// Seconds a connection must stay open before the delay resets
    #[arg(long, default_value_t = DEFAULT_STABLE_AFTER.as_secs_f64())]
    pub backoff_stable_after: f64,

    /// HLS playlist to read the watched segment from (URL or path on the server)
    #[arg(long)]
    pub playlist: Option<String>,

    /// Do not poll the heartbeat endpoint
    #[arg(long)]
    pub no_heartbeat: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Heartbeat settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatConfig {
    pub url: Url,
    pub period: Duration,
    pub request_timeout: Duration,
    pub policy: HealthPolicy,
    /// Playlist to probe; the playback clock is used when absent
    pub playlist: Option<Url>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server: Url,
    pub token: String,
    pub live_url: Url,
    pub backoff: BackoffPolicy,
    pub ping_grace: Duration,
    pub connect_timeout: Duration,
    /// `None` when the heartbeat is disabled
    pub heartbeat: Option<HeartbeatConfig>,
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

fn positive_seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    let duration = seconds(name, value)?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration(name));
    }
    Ok(duration)
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
    base.join(path).map_err(|e| ConfigError::InvalidUrl {
        url: path.to_string(),
        reason: e.to_string(),
    })
}

impl TryFrom<Cli> for ClientConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let server = Url::parse(&cli.server).map_err(|e| ConfigError::InvalidUrl {
            url: cli.server.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(server.scheme().to_string()));
        }

        let token = match cli.token {
            Some(token) if token.trim().is_empty() => return Err(ConfigError::EmptyToken),
            Some(token) => token,
            None => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                tracing::info!("No token given, using a generated one");
                token
            }
        };

        let live_url = live_url(&server, &token, cli.lang.as_deref()).map_err(|e| match e {
            TransportError::UnsupportedScheme(scheme) => ConfigError::UnsupportedScheme(scheme),
            other => ConfigError::InvalidUrl {
                url: server.to_string(),
                reason: other.to_string(),
            },
        })?;

        let backoff = BackoffPolicy {
            floor: positive_seconds("backoff-floor", cli.backoff_floor)?,
            ceiling: positive_seconds("backoff-ceiling", cli.backoff_ceiling)?,
            stable_after: seconds("backoff-stable-after", cli.backoff_stable_after)?,
        };
        if backoff.floor > backoff.ceiling {
            return Err(ConfigError::BackoffFloorAboveCeiling {
                floor: backoff.floor,
                ceiling: backoff.ceiling,
            });
        }

        let heartbeat = if cli.no_heartbeat {
            None
        } else {
            let period = positive_seconds("heartbeat-period", cli.heartbeat_period)?;
            let request_timeout = positive_seconds("heartbeat-timeout", cli.heartbeat_timeout)?;
            if request_timeout >= period {
                return Err(ConfigError::TimeoutNotShorterThanPeriod {
                    timeout: request_timeout,
                    period,
                });
            }
            Some(HeartbeatConfig {
                url: join(&server, "/heartbeat")?,
                period,
                request_timeout,
                policy: HealthPolicy {
                    playback_timeout: seconds("playback-timeout", cli.playback_timeout)?,
                    segment_duration: positive_seconds("segment-duration", cli.segment_duration)?,
                    latency_threshold: seconds("latency-threshold", cli.latency_threshold)?,
                },
                playlist: cli
                    .playlist
                    .as_deref()
                    .map(|playlist| join(&server, playlist))
                    .transpose()?,
            })
        };

        Ok(Self {
            server,
            token,
            live_url,
            backoff,
            ping_grace: seconds("ping-grace", cli.ping_grace)?,
            connect_timeout: positive_seconds("connect-timeout", cli.connect_timeout)?,
            heartbeat,
        })
    }
}
