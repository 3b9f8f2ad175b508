//! Data transfer objects for the WebSocket and HTTP endpoints.

pub mod http;
pub mod websocket;

pub use http::HeartbeatResponseDto;
pub use websocket::{
    ClientMessage, DecodeError, ServerMessage, decode_server_message, encode_client_message,
};
