use crate::ws::backoff::{Backoff, ReconnectPolicy};
use crate::ws::protocol::Command;
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Opening,
    Open,
    Closed,
}

/// Lifecycle signals and inbound frames, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Held until the next successful connect
    Queued,
    Dropped,
}

/// Anything that can carry commands to the device
pub trait CommandSink {
    /// Never fails: a command that cannot go out is queued or dropped.
    fn send(&self, command: &Command) -> SendOutcome;
}

#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    outbound: Option<UnboundedSender<String>>,
    pending: VecDeque<String>,
    queue_capacity: usize,
}

/// Cheap, cloneable front of the device connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    shared: Arc<Mutex<Shared>>,
}

impl ConnectionHandle {
    fn new(state: ConnectionState, queue_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state,
                outbound: None,
                pending: VecDeque::new(),
                queue_capacity,
            })),
        }
    }

    /// A handle with no driver behind it; always `Closed`
    pub fn detached() -> Self {
        Self::new(ConnectionState::Closed, 0)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Commands waiting for a reconnect
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn send_text(&self, text: String) -> SendOutcome {
        let mut shared = self.lock();

        let text = match (&shared.state, &shared.outbound) {
            (ConnectionState::Open, Some(tx)) => match tx.send(text) {
                Ok(()) => return SendOutcome::Sent,
                Err(mpsc::error::SendError(text)) => text,
            },
            _ => text,
        };

        if shared.queue_capacity == 0 {
            debug!(state = ?shared.state, "connection not open; command dropped");
            return SendOutcome::Dropped;
        }

        if shared.pending.len() >= shared.queue_capacity {
            shared.pending.pop_front();
            warn!(
                capacity = shared.queue_capacity,
                "command queue full; oldest queued command dropped"
            );
        }
        shared.pending.push_back(text);
        SendOutcome::Queued
    }

    fn set_state(&self, state: ConnectionState) {
        self.lock().state = state;
    }

    /// Install the writer channel and flush queued commands into it, in order
    fn open(&self, tx: UnboundedSender<String>) {
        let mut shared = self.lock();
        let mut flushed = 0;
        while let Some(text) = shared.pending.pop_front() {
            if tx.send(text).is_err() {
                break;
            }
            flushed += 1;
        }
        if flushed > 0 {
            info!(count = flushed, "flushed queued commands");
        }
        shared.outbound = Some(tx);
        shared.state = ConnectionState::Open;
    }

    /// Tear down the writer; anything accepted but never written goes back to
    /// the front of the queue
    fn close(&self, unwritten: Option<String>, rx: &mut UnboundedReceiver<String>) {
        let mut shared = self.lock();
        shared.outbound = None;
        shared.state = ConnectionState::Closed;

        let mut requeue: VecDeque<String> = unwritten.into_iter().collect();
        while let Ok(text) = rx.try_recv() {
            requeue.push_back(text);
        }
        if requeue.is_empty() {
            return;
        }

        if shared.queue_capacity == 0 {
            debug!(count = requeue.len(), "unwritten commands dropped on close");
            return;
        }

        requeue.append(&mut shared.pending);
        while requeue.len() > shared.queue_capacity {
            requeue.pop_front();
        }
        shared.pending = requeue;
    }
}

impl CommandSink for ConnectionHandle {
    fn send(&self, command: &Command) -> SendOutcome {
        match command.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!("Failed to serialize command: {}", e);
                SendOutcome::Dropped
            }
        }
    }
}

/// Start the connection driver for `url`.
///
/// With `policy == None` the socket is opened once and `Closed` is final.
/// Otherwise the driver reconnects with backoff and holds up to
/// `queue_capacity` commands while down.
pub fn connect(
    url: impl Into<String>,
    policy: Option<ReconnectPolicy>,
    queue_capacity: usize,
) -> (
    ConnectionHandle,
    UnboundedReceiver<ConnectionEvent>,
    JoinHandle<()>,
) {
    let capacity = if policy.is_some() { queue_capacity } else { 0 };
    let handle = ConnectionHandle::new(ConnectionState::Opening, capacity);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let driver = tokio::spawn(drive(url.into(), policy, handle.clone(), events_tx));

    (handle, events_rx, driver)
}

async fn drive(
    url: String,
    policy: Option<ReconnectPolicy>,
    handle: ConnectionHandle,
    events: UnboundedSender<ConnectionEvent>,
) {
    let mut backoff = policy.map(Backoff::new);

    loop {
        handle.set_state(ConnectionState::Opening);
        let connection_id = uuid::Uuid::new_v4();
        debug!(%url, %connection_id, "opening device socket");

        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                info!(%url, %connection_id, "device socket open");
                if let Some(backoff) = backoff.as_mut() {
                    backoff.reset();
                }

                let (tx, mut rx) = mpsc::unbounded_channel();
                handle.open(tx);
                let _ = events.send(ConnectionEvent::Opened);

                let unwritten = pump(socket, &mut rx, &events).await;
                handle.close(unwritten, &mut rx);
                info!(%connection_id, "device socket closed");
            }
            Err(e) => {
                warn!(%url, error = %e, "failed to open device socket");
                handle.set_state(ConnectionState::Closed);
                let _ = events.send(ConnectionEvent::Error(e.to_string()));
            }
        }

        if events.send(ConnectionEvent::Closed).is_err() {
            debug!("event receiver gone; stopping connection driver");
            break;
        }

        let Some(backoff) = backoff.as_mut() else {
            break;
        };
        let Some(delay) = backoff.next_delay() else {
            warn!(attempts = backoff.attempt() - 1, "giving up on device socket");
            break;
        };
        info!(
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "reconnecting to device"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Shuttle frames both ways until the socket ends. Returns a command whose
/// write failed, if any.
async fn pump(
    socket: DeviceSocket,
    outbound: &mut UnboundedReceiver<String>,
    events: &UnboundedSender<ConnectionEvent>,
) -> Option<String> {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            Some(text) = outbound.recv() => {
                if let Err(e) = ws_sender.send(Message::Text(text.clone())).await {
                    error!("Failed to send command to device: {}", e);
                    let _ = events.send(ConnectionEvent::Error(e.to_string()));
                    return Some(text);
                }
            }
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ConnectionEvent::Frame(text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send(ConnectionEvent::Frame(text));
                    }
                    Err(e) => {
                        warn!("Dropping non-UTF-8 frame from device: {}", e);
                        let _ = events.send(ConnectionEvent::Error(e.to_string()));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "device closed the socket");
                    return None;
                }
                Some(Ok(_)) => {
                    // Ping/pong is answered by tungstenite
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    let _ = events.send(ConnectionEvent::Error(e.to_string()));
                    return None;
                }
                None => return None,
            }
        }
    }
}
