pub mod api;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod export;
pub mod notifications;
pub mod render;
pub mod runtime;
pub mod session;
pub mod snapshot;
pub mod telemetry;
pub mod ws;

// Re-export commonly used items
pub use commands::Intent;
pub use config::Config;
pub use error::{AppError, Result};
pub use session::{DashboardState, FrameOutcome, Session};
pub use ws::{Command, CommandSink, ConnectionHandle, ConnectionState, SendOutcome};
