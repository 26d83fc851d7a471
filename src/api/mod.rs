pub mod client;
pub mod snapshot;

pub use client::{ApiClient, ApiError};
pub use snapshot::{NotificationsResponse, SettingsResponse};
