use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_ws_port() -> u16 {
    81
}

fn default_http_port() -> u16 {
    80
}

impl DeviceConfig {
    /// Live socket address, derived from the device host
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.ws_port)
    }

    /// Base URL for the snapshot endpoints
    pub fn http_base_url(&self) -> String {
        if self.http_port == 80 {
            format!("http://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.http_port)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Commands held while disconnected; only used when reconnect is enabled
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    32
}

/// Exponential backoff settings. Disabled by default: the device connection is
/// opened once and a drop leaves the dashboard stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Fraction of the delay (0.0 - 1.0) used as +/- jitter
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// 0 = unlimited
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Per-request timeout; unset means requests may wait indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Redraw after every accepted frame and every clock tick
    #[serde(default = "default_live")]
    pub live: bool,
}

fn default_live() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { live: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_path")]
    pub path: String,
}

fn default_export_path() -> String {
    "logs.txt".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution.
    /// `DEVICE_HOST`, when set, overrides `device.host`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Expand environment variables in the format $(VAR_NAME)
        let expanded = expand_env_vars(content)?;

        let mut config: Config = serde_yaml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("DEVICE_HOST") {
            config.device.host = host;
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(AppError::Config("Device host cannot be empty".to_string()));
        }

        if self.device.ws_port == 0 {
            return Err(AppError::Config("Device ws_port cannot be 0".to_string()));
        }

        if self.device.http_port == 0 {
            return Err(AppError::Config(
                "Device http_port cannot be 0".to_string(),
            ));
        }

        let reconnect = &self.connection.reconnect;
        if reconnect.enabled {
            if reconnect.multiplier < 1.0 {
                return Err(AppError::Config(
                    "Reconnect multiplier must be at least 1.0".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&reconnect.jitter) {
                return Err(AppError::Config(
                    "Reconnect jitter must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();

    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)")
        .map_err(|e| AppError::Config(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}
