//! WebSocket transport for the live chat endpoint.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};

use crate::{
    domain::{InboundEvent, OutboundCommand},
    infrastructure::dto::{DecodeError, decode_server_message, encode_client_message},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time allowed for the TCP connect and WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by the live connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unsupported server URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
}

/// One frame read from the server.
#[derive(Debug)]
pub enum Frame {
    Event(InboundEvent),
    /// A text frame that could not be decoded
    Malformed { text: String, error: DecodeError },
    /// The server closed the connection
    Closed,
}

/// Build `ws(s)://host/live?token=…[&lang=…]` from the site base URL.
pub fn live_url(base: &Url, token: &str, lang: Option<&str>) -> Result<Url, TransportError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::UnsupportedScheme(base.scheme().to_string()))?;
    url.set_path("/live");
    url.set_fragment(None);
    {
        let mut query = url.query_pairs_mut();
        query.clear().append_pair("token", token);
        if let Some(lang) = lang {
            query.append_pair("lang", lang);
        }
    }
    Ok(url)
}

/// An open connection to `/live`.
pub struct LiveConnection {
    socket: Socket,
}

impl LiveConnection {
    /// Open the WebSocket, giving up after `connect_timeout`.
    pub async fn connect(url: &Url, connect_timeout: Duration) -> Result<Self, TransportError> {
        let (socket, response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::ConnectTimeout(connect_timeout))??;
        tracing::debug!(status = %response.status(), "WebSocket handshake completed");
        Ok(Self { socket })
    }

    /// Encode and send one command.
    pub async fn send(&mut self, command: OutboundCommand) -> Result<(), TransportError> {
        let text = encode_client_message(command)?;
        tracing::trace!("Sending: {}", text);
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Wait for the next text frame.
    ///
    /// Control frames are handled by tungstenite and skipped here; binary
    /// frames are not part of the protocol and are ignored.
    pub async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let Some(message) = self.socket.next().await else {
                return Ok(Frame::Closed);
            };
            match message? {
                Message::Text(text) => {
                    tracing::trace!("Received: {}", text.as_str());
                    return Ok(match decode_server_message(text.as_str()) {
                        Ok(event) => Frame::Event(event),
                        Err(error) => Frame::Malformed {
                            text: text.to_string(),
                            error,
                        },
                    });
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Server closed the connection");
                    return Ok(Frame::Closed);
                }
                Message::Binary(_) => tracing::debug!("Ignoring binary frame"),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Close the connection, ignoring errors from an already broken socket.
    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!("Error while closing WebSocket: {}", e);
        }
    }
}
