use crate::telemetry::fields::numeric_or_zero;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::fmt::Display;

/// One alert as shown in the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    /// Epoch seconds; device-supplied for snapshots, client clock for live pushes
    pub timestamp: f64,
    pub text: Option<String>,
    /// The entry as received, rendered when there is no text
    pub raw: Value,
}

impl NotificationEntry {
    /// Snapshot entries are `{ts, text}` objects, but bare values are tolerated
    pub fn from_snapshot(raw: Value) -> Self {
        let timestamp = raw.get("ts").map(numeric_or_zero).unwrap_or(0.0);
        let text = raw.get("text").and_then(Value::as_str).map(str::to_owned);
        Self {
            timestamp,
            text,
            raw,
        }
    }

    fn display_text(&self) -> String {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => text.to_owned(),
            _ => match &self.raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// Alerts, newest first
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: Vec<NotificationEntry>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a snapshot, which the device lists oldest-first
    pub fn replace_from_snapshot(&mut self, oldest_first: Vec<Value>) {
        self.entries = oldest_first
            .into_iter()
            .rev()
            .map(NotificationEntry::from_snapshot)
            .collect();
    }

    /// Live pushes carry no timestamp, so the receive time is used
    pub fn push_live(&mut self, text: Option<String>, raw: Value, received_at: DateTime<Utc>) {
        let timestamp = received_at.timestamp_millis() as f64 / 1000.0;
        self.entries.insert(
            0,
            NotificationEntry {
                timestamp,
                text,
                raw,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display text of every entry, newest first
    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.display_text()).collect()
    }
}

/// `<date-time> — <text>` in the given zone
pub fn format_entry<Tz>(entry: &NotificationEntry, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let millis = (entry.timestamp * 1000.0) as i64;
    let when = match tz.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%d/%m/%Y, %-I:%M:%S %p").to_string(),
        None => "Invalid Date".to_string(),
    };
    format!("{} — {}", when, entry.display_text())
}
