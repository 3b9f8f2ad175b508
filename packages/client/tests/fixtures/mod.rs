//! In-process stream server for integration tests.
//!
//! Serves `/live` (WebSocket) and `/heartbeat` (JSON) on a fixed port. Each
//! accepted WebSocket is handed to the test as a [`LiveSocket`] so that the
//! test plays the server side of the conversation.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

/// Server side of one client connection.
pub struct LiveSocket {
    pub query: HashMap<String, String>,
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: mpsc::UnboundedReceiver<String>,
}

impl LiveSocket {
    /// Send a JSON frame to the client.
    pub fn send(&self, value: Value) {
        self.send_text(value.to_string());
    }

    /// Send a raw text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) {
        self.outgoing
            .send(Message::Text(text.into().into()))
            .expect("Socket task is gone");
    }

    /// Next JSON frame from the client.
    pub async fn recv(&mut self) -> Value {
        let text = timeout(WAIT, self.incoming.recv())
            .await
            .expect("Timed out waiting for a client frame")
            .expect("Client disconnected");
        serde_json::from_str(&text).expect("Client sent invalid JSON")
    }

    /// Wait until the client closes the connection.
    pub async fn closed(&mut self) {
        timeout(WAIT, async {
            while self.incoming.recv().await.is_some() {}
        })
        .await
        .expect("Timed out waiting for the client to disconnect");
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        // The socket may already be gone.
        let _ = self.outgoing.send(Message::Close(None));
    }
}

#[derive(Clone)]
struct ServerState {
    connections: mpsc::UnboundedSender<LiveSocket>,
    heartbeat: Arc<Mutex<(StatusCode, Value)>>,
    heartbeat_tokens: Arc<Mutex<Vec<String>>>,
}

pub struct TestServer {
    port: u16,
    connections: mpsc::UnboundedReceiver<LiveSocket>,
    heartbeat: Arc<Mutex<(StatusCode, Value)>>,
    heartbeat_tokens: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start serving on `127.0.0.1:port`.
    pub async fn start(port: u16) -> Self {
        let (connections_tx, connections_rx) = mpsc::unbounded_channel();
        let heartbeat = Arc::new(Mutex::new((
            StatusCode::OK,
            json!({
                "viewers": 0,
                "online": false,
                "current_segment": null,
                "title": "",
                "start_abs": null,
                "start_rel": null,
            }),
        )));
        let heartbeat_tokens = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            connections: connections_tx,
            heartbeat: heartbeat.clone(),
            heartbeat_tokens: heartbeat_tokens.clone(),
        };

        let app = Router::new()
            .route("/live", get(live))
            .route("/heartbeat", get(heartbeat_handler))
            .with_state(state);
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind test server");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            port,
            connections: connections_rx,
            heartbeat,
            heartbeat_tokens,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Wait for the next WebSocket connection.
    pub async fn accept(&mut self) -> LiveSocket {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("Timed out waiting for a connection")
            .expect("Server stopped")
    }

    /// Whether a connection arrives within `within`.
    pub async fn try_accept(&mut self, within: Duration) -> Option<LiveSocket> {
        timeout(within, self.connections.recv()).await.ok().flatten()
    }

    /// Reply to subsequent heartbeats with `status` and `body`.
    pub fn set_heartbeat(&self, status: StatusCode, body: Value) {
        *self.heartbeat.lock().unwrap() = (status, body);
    }

    /// Tokens sent by heartbeat requests so far.
    pub fn heartbeat_tokens(&self) -> Vec<String> {
        self.heartbeat_tokens.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn live(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    ws.on_upgrade(move |socket| bridge(socket, state, query))
}

async fn bridge(socket: WebSocket, state: ServerState, query: HashMap<String, String>) {
    let (mut sender, mut receiver) = socket.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

    if state
        .connections
        .send(LiveSocket {
            query,
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
        .is_err()
    {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if incoming_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn heartbeat_handler(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Some(token) = query.get("token") {
        state.heartbeat_tokens.lock().unwrap().push(token.clone());
    }
    let (status, body) = state.heartbeat.lock().unwrap().clone();
    (status, Json(body))
}
