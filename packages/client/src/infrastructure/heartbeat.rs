//! HTTP heartbeat source backed by reqwest.

use async_trait::async_trait;
use reqwest::Url;

use crate::{
    domain::{HeartbeatSnapshot, HeartbeatSource, SourceError},
    infrastructure::dto::HeartbeatResponseDto,
};

/// Polls `GET /heartbeat?token=…`.
#[derive(Debug, Clone)]
pub struct HttpHeartbeatSource {
    client: reqwest::Client,
    url: Url,
    token: String,
}

impl HttpHeartbeatSource {
    /// Create a new source.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `url` - Full heartbeat endpoint URL
    /// * `token` - Viewer token sent as query parameter
    pub fn new(client: reqwest::Client, url: Url, token: String) -> Self {
        Self { client, url, token }
    }
}

#[async_trait]
impl HeartbeatSource for HttpHeartbeatSource {
    async fn fetch(&self) -> Result<HeartbeatSnapshot, SourceError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response
            .json::<HeartbeatResponseDto>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        tracing::debug!(
            online = body.online,
            viewers = body.viewers,
            "Received heartbeat response"
        );

        Ok(body.into())
    }
}
