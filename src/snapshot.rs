use crate::api::{ApiClient, ApiError, NotificationsResponse, SettingsResponse};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Completion of a one-shot snapshot read, posted back to the event loop
#[derive(Debug)]
pub enum SnapshotEvent {
    Notifications(Result<NotificationsResponse, ApiError>),
    Settings(Result<SettingsResponse, ApiError>),
    /// `path` is where the export should be written
    Logs {
        path: String,
        result: Result<Value, ApiError>,
    },
}

/// Runs snapshot reads as background tasks. Results only travel through the
/// channel; the loader never touches dashboard state itself.
#[derive(Clone)]
pub struct SnapshotLoader {
    client: ApiClient,
    tx: UnboundedSender<SnapshotEvent>,
}

impl SnapshotLoader {
    pub fn new(client: ApiClient, tx: UnboundedSender<SnapshotEvent>) -> Self {
        Self { client, tx }
    }

    /// Notifications and settings, read independently so one failing does not
    /// hold up the other
    pub fn load_startup(&self) {
        self.refresh_notifications();

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.get_settings().await;
            if tx.send(SnapshotEvent::Settings(result)).is_err() {
                debug!("settings snapshot finished after shutdown");
            }
        });
    }

    pub fn refresh_notifications(&self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.get_notifications().await;
            if tx.send(SnapshotEvent::Notifications(result)).is_err() {
                debug!("notifications snapshot finished after shutdown");
            }
        });
    }

    pub fn fetch_logs(&self, path: impl Into<String>) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let path = path.into();
        tokio::spawn(async move {
            let result = client.get_logs().await;
            if tx.send(SnapshotEvent::Logs { path, result }).is_err() {
                debug!("logs snapshot finished after shutdown");
            }
        });
    }
}
