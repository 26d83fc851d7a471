use crate::telemetry::fields::{numeric_or_zero, truthy, truthy_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Number of switched loads on the device
pub const LOAD_COUNT: usize = 4;

/// Commands sent from the dashboard to the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    #[serde(rename = "relay")]
    Relay { id: u8, state: bool },
    /// `id` 0 addresses the load currently selected on the device; `minutes` 0 cancels
    #[serde(rename = "setTimer")]
    SetTimer { id: u8, minutes: u32 },
    #[serde(rename = "setLimit")]
    SetLimit { id: u8, seconds: u64 },
    #[serde(rename = "setPrice")]
    SetPrice { price: f64 },
    #[serde(rename = "clearNotifs")]
    ClearNotifications,
}

impl Command {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("state frame has no `loads` array")]
    MissingLoads,
    #[error("load record {index} has no `id`")]
    MissingLoadId { index: usize },
    #[error("load record {index} has unknown id {id}")]
    UnknownLoadId { index: usize, id: String },
}

/// One per-load record from a state frame, after defaulting
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub id: u8,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub relay: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateFrame {
    pub loads: Vec<LoadRecord>,
    /// Present only when the device sent a truthy price
    pub unit_price: Option<f64>,
}

/// Frames received from the device, tagged by `type`
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    State(StateFrame),
    Notification { text: Option<String>, raw: Value },
    /// Unrecognized `type`; carried so the caller can log it
    Ignored(String),
}

impl InboundFrame {
    /// Decode one text frame. Every load record is validated before anything is
    /// returned, so a frame is either accepted whole or rejected whole.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
        let frame_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_owned();

        match frame_type.as_str() {
            "state" => {
                let loads = obj
                    .get("loads")
                    .and_then(Value::as_array)
                    .ok_or(DecodeError::MissingLoads)?;

                let loads = loads
                    .iter()
                    .enumerate()
                    .map(|(index, record)| decode_load(index, record))
                    .collect::<Result<Vec<_>, _>>()?;

                let unit_price = obj.get("unitPrice").and_then(truthy_number);

                Ok(InboundFrame::State(StateFrame { loads, unit_price }))
            }
            "notification" => {
                let text = obj
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Ok(InboundFrame::Notification { text, raw: value })
            }
            _ => Ok(InboundFrame::Ignored(frame_type)),
        }
    }
}

fn decode_load(index: usize, record: &Value) -> Result<LoadRecord, DecodeError> {
    let raw_id = record
        .get("id")
        .filter(|v| !v.is_null())
        .ok_or(DecodeError::MissingLoadId { index })?;

    let id = load_id(raw_id).ok_or_else(|| DecodeError::UnknownLoadId {
        index,
        id: raw_id.to_string(),
    })?;

    let field = |name: &str| record.get(name).map(numeric_or_zero).unwrap_or(0.0);

    Ok(LoadRecord {
        id,
        voltage: field("voltage"),
        current: field("current"),
        power: field("power"),
        energy: field("energy"),
        relay: record.get("relay").map(truthy).unwrap_or(false),
    })
}

/// Accepts 1..=4 as an integer, or a string holding one
fn load_id(value: &Value) -> Option<u8> {
    let id = match value {
        // 1.0 names load 1 just as 1 does
        Value::Number(n) => match n.as_u64() {
            Some(id) => id,
            None => n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0)? as u64,
        },
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    (1..=LOAD_COUNT as u64)
        .contains(&id)
        .then_some(id as u8)
}
