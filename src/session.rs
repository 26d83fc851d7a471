use crate::api::{ApiError, NotificationsResponse, SettingsResponse};
use crate::commands::{encode, Intent};
use crate::notifications::NotificationLog;
use crate::telemetry::fields::truthy_number;
use crate::telemetry::Reconciler;
use crate::ws::connection::{CommandSink, SendOutcome};
use crate::ws::protocol::{Command, InboundFrame};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Everything the dashboard displays
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub reconciler: Reconciler,
    pub notifications: NotificationLog,
    /// `None` until the device or the settings snapshot reports one
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    StateApplied,
    NotificationAdded,
    Ignored,
    Rejected,
}

/// Owns the dashboard state and is its only writer. Frames, user intents and
/// snapshot completions all go through here, one at a time.
pub struct Session<S> {
    state: DashboardState,
    sink: S,
}

impl<S: CommandSink> Session<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: DashboardState::default(),
            sink,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn handle_frame(&mut self, text: &str) -> FrameOutcome {
        self.handle_frame_at(text, Utc::now())
    }

    /// Reconcile one inbound frame. A frame that fails to decode or apply is
    /// logged and leaves the state exactly as it was.
    pub fn handle_frame_at(&mut self, text: &str, received_at: DateTime<Utc>) -> FrameOutcome {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse device frame: {}", e);
                debug!("Raw frame: {}", text);
                return FrameOutcome::Rejected;
            }
        };

        match frame {
            InboundFrame::State(state) => {
                if let Err(e) = self.state.reconciler.apply(&state) {
                    warn!("Discarding state frame: {}", e);
                    return FrameOutcome::Rejected;
                }
                if let Some(price) = state.unit_price {
                    self.state.unit_price = Some(price);
                }
                FrameOutcome::StateApplied
            }
            InboundFrame::Notification { text, raw } => {
                info!(text = text.as_deref().unwrap_or(""), "device notification");
                self.state.notifications.push_live(text, raw, received_at);
                FrameOutcome::NotificationAdded
            }
            InboundFrame::Ignored(frame_type) => {
                debug!(%frame_type, "ignoring frame of unknown type");
                FrameOutcome::Ignored
            }
        }
    }

    /// Encode and send one user intent. Clearing notifications empties the
    /// local list whether or not the command reaches the device. Relay state
    /// is never touched locally; the next device frame is authoritative.
    pub fn dispatch(&mut self, intent: &Intent) -> SendOutcome {
        let command = encode(intent);
        if command == Command::ClearNotifications {
            self.state.notifications.clear();
        }

        let outcome = self.sink.send(&command);
        debug!(?command, ?outcome, "command dispatched");
        outcome
    }

    pub fn apply_notifications_snapshot(
        &mut self,
        result: Result<NotificationsResponse, ApiError>,
    ) {
        match result {
            Ok(response) => {
                debug!(count = response.notifs.len(), "notifications snapshot loaded");
                self.state.notifications.replace_from_snapshot(response.notifs);
            }
            Err(e) => warn!("Notifications snapshot failed: {}", e),
        }
    }

    /// Only a truthy price replaces the current one
    pub fn apply_settings_snapshot(&mut self, result: Result<SettingsResponse, ApiError>) {
        match result {
            Ok(settings) => match settings.unit_price.as_ref().and_then(truthy_number) {
                Some(price) => {
                    debug!(price, "unit price loaded from settings");
                    self.state.unit_price = Some(price);
                }
                None => debug!("settings carry no usable unit price"),
            },
            Err(e) => warn!("Settings snapshot failed: {}", e),
        }
    }
}
