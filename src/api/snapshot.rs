use super::client::{ApiClient, ApiError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `/notifs.json`, oldest entry first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsResponse {
    /// A missing or `null` list means the device holds no notifications
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notifs: Vec<Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `/settings.json`; the price is kept raw so falsy values can be told apart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsResponse {
    #[serde(rename = "unitPrice", default)]
    pub unit_price: Option<Value>,
}

impl ApiClient {
    pub async fn get_notifications(&self) -> Result<NotificationsResponse, ApiError> {
        self.get("/notifs.json").await
    }

    pub async fn get_settings(&self) -> Result<SettingsResponse, ApiError> {
        self.get("/settings.json").await
    }

    /// Raw device logs, used only for export
    pub async fn get_logs(&self) -> Result<Value, ApiError> {
        self.get("/logs.json").await
    }
}
