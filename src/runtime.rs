use crate::api::ApiClient;
use crate::config::Config;
use crate::console::{Console, UiEvent};
use crate::error::Result;
use crate::export::write_logs_snapshot;
use crate::render::project;
use crate::session::{FrameOutcome, Session};
use crate::snapshot::{SnapshotEvent, SnapshotLoader};
use crate::ws::backoff::ReconnectPolicy;
use crate::ws::connection::{connect, ConnectionEvent, ConnectionHandle, SendOutcome};
use chrono::Local;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

/// Clears the terminal before a live redraw
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Run the dashboard until `quit`, Ctrl+C, or SIGTERM.
///
/// Everything that touches dashboard state happens inside the one `select!`
/// loop below, so events are handled strictly one at a time.
pub async fn run(config: Config, mut ui_rx: UnboundedReceiver<String>) -> Result<()> {
    let client = ApiClient::new(config.device.http_base_url(), config.snapshot.timeout())?;
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
    let loader = SnapshotLoader::new(client, snapshot_tx);
    loader.load_startup();

    let policy = ReconnectPolicy::from_config(&config.connection.reconnect);
    let ws_url = config.device.ws_url();
    info!(url = %ws_url, reconnect = policy.is_some(), "connecting to device");
    let (connection, mut connection_rx, driver) =
        connect(ws_url, policy, config.connection.queue_capacity);

    let mut session = Session::new(connection.clone());
    let mut console = Console::new();
    let screen = Screen::new(&config, connection);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut ui_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            line = ui_rx.recv(), if ui_open => {
                let Some(line) = line else {
                    debug!("input closed; continuing without controls");
                    ui_open = false;
                    continue;
                };
                match console.parse(&line) {
                    Ok(UiEvent::Quit) => break,
                    Ok(event) => handle_ui_event(event, &mut session, &loader, &config, &screen),
                    Err(e) => warn!("{}", e),
                }
            }
            Some(event) = connection_rx.recv() => {
                match event {
                    ConnectionEvent::Opened => info!("live telemetry connected"),
                    ConnectionEvent::Frame(text) => {
                        let outcome = session.handle_frame(&text);
                        if matches!(outcome, FrameOutcome::StateApplied | FrameOutcome::NotificationAdded) {
                            screen.redraw_if_live(&session);
                        }
                    }
                    ConnectionEvent::Error(e) => warn!("Device socket error: {}", e),
                    ConnectionEvent::Closed => warn!("Device socket closed"),
                }
            }
            Some(event) = snapshot_rx.recv() => {
                match event {
                    SnapshotEvent::Notifications(result) => session.apply_notifications_snapshot(result),
                    SnapshotEvent::Settings(result) => session.apply_settings_snapshot(result),
                    SnapshotEvent::Logs { path, result } => match result {
                        Ok(logs) => {
                            if let Err(e) = write_logs_snapshot(&path, &logs).await {
                                warn!(%path, "Failed to write logs snapshot: {}", e);
                            }
                        }
                        Err(e) => warn!("Logs snapshot failed: {}", e),
                    },
                }
                screen.redraw_if_live(&session);
            }
            _ = ticker.tick(), if screen.live => {
                screen.redraw(&session);
            }
        }
    }

    driver.abort();
    info!("dashboard stopped");
    Ok(())
}

fn handle_ui_event(
    event: UiEvent,
    session: &mut Session<ConnectionHandle>,
    loader: &SnapshotLoader,
    config: &Config,
    screen: &Screen,
) {
    match event {
        UiEvent::Dispatch(intents) => {
            for intent in &intents {
                if session.dispatch(intent) == SendOutcome::Dropped {
                    warn!(?intent, "device not connected; command dropped");
                }
            }
            screen.redraw_if_live(session);
        }
        UiEvent::RefreshNotifications => loader.refresh_notifications(),
        UiEvent::ExportLogs { path } => {
            loader.fetch_logs(path.unwrap_or_else(|| config.export.path.clone()))
        }
        UiEvent::Show => screen.redraw(session),
        UiEvent::Nothing | UiEvent::Quit => {}
    }
}

/// Stdout projection of the session
struct Screen {
    live: bool,
    host: String,
    connection: ConnectionHandle,
}

impl Screen {
    fn new(config: &Config, connection: ConnectionHandle) -> Self {
        Self {
            live: config.render.live,
            host: config.device.host.clone(),
            connection,
        }
    }

    fn redraw_if_live(&self, session: &Session<ConnectionHandle>) {
        if self.live {
            self.redraw(session);
        }
    }

    fn redraw(&self, session: &Session<ConnectionHandle>) {
        let view = project(
            session.state(),
            self.connection.state(),
            &self.host,
            &Local::now(),
        );

        let mut out = std::io::stdout().lock();
        let prefix = if self.live { CLEAR_SCREEN } else { "" };
        if let Err(e) = write!(out, "{prefix}{view}").and_then(|_| out.flush()) {
            debug!("Failed to write dashboard: {}", e);
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
