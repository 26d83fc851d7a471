use crate::error::Result;
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub const EXPORT_TITLE: &str = "Power Tracker - Logs snapshot";

/// Characters of log JSON kept in the export
pub const EXPORT_BODY_LIMIT: usize = 1500;

/// Title line followed by the compact JSON, cut at [`EXPORT_BODY_LIMIT`] characters
pub fn render_logs_snapshot(logs: &Value) -> String {
    let body: String = logs.to_string().chars().take(EXPORT_BODY_LIMIT).collect();
    format!("{EXPORT_TITLE}\n{body}\n")
}

pub async fn write_logs_snapshot(path: impl AsRef<Path>, logs: &Value) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, render_logs_snapshot(logs)).await?;
    info!(path = %path.display(), "logs snapshot written");
    Ok(())
}
