//! In-process stand-in for the power tracker device: the live socket on `/`
//! plus the three JSON snapshot endpoints, all on one ephemeral port.

#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use power_tracker_client::config::DeviceConfig;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// One frame the device pushes unprompted
#[derive(Clone, Debug)]
pub enum DeviceFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl From<String> for DeviceFrame {
    fn from(text: String) -> Self {
        DeviceFrame::Text(text)
    }
}

impl From<&str> for DeviceFrame {
    fn from(text: &str) -> Self {
        DeviceFrame::Text(text.to_owned())
    }
}

#[derive(Clone, Default)]
pub struct DeviceScript {
    /// Frames pushed to every new socket right after the handshake
    pub greeting: Vec<DeviceFrame>,
    /// Close the first socket once the greeting is out
    pub close_first_connection: bool,
    pub notifs: Value,
    /// `None` answers `/settings.json` with a 500
    pub settings: Option<Value>,
    pub logs: Value,
}

#[derive(Clone)]
struct DeviceState {
    script: Arc<DeviceScript>,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedSender<String>,
}

pub struct FakeDevice {
    pub addr: SocketAddr,
    /// Text frames the dashboard sent, in order
    pub received: mpsc::UnboundedReceiver<String>,
    server: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn start(script: DeviceScript) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = DeviceState {
            script: Arc::new(script),
            connections: Arc::new(AtomicUsize::new(0)),
            received: tx,
        };

        let app = Router::new()
            .route("/", get(ws_upgrade))
            .route("/notifs.json", get(notifs))
            .route("/settings.json", get(settings))
            .route("/logs.json", get(logs))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            received: rx,
            server,
        }
    }

    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            host: self.addr.ip().to_string(),
            ws_port: self.addr.port(),
            http_port: self.addr.port(),
        }
    }

    pub async fn next_command(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("device should receive a command")
            .expect("device channel open");
        serde_json::from_str(&text).unwrap()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<DeviceState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: DeviceState) {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);

    for frame in &state.script.greeting {
        let msg = match frame {
            DeviceFrame::Text(text) => Message::Text(text.clone().into()),
            DeviceFrame::Binary(bytes) => Message::Binary(bytes.clone().into()),
        };
        if socket.send(msg).await.is_err() {
            return;
        }
    }

    if index == 0 && state.script.close_first_connection {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let _ = state.received.send(text.as_str().to_owned());
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn notifs(State(state): State<DeviceState>) -> Json<Value> {
    Json(state.script.notifs.clone())
}

async fn settings(State(state): State<DeviceState>) -> Response {
    match &state.script.settings {
        Some(settings) => Json(settings.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "settings unavailable").into_response(),
    }
}

async fn logs(State(state): State<DeviceState>) -> Json<Value> {
    Json(state.script.logs.clone())
}
