//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their compiled default.

use serde::{Deserialize, Serialize};
use wandersafe_core::logging::LogFormat;
use wandersafe_core::{IdentityBinding, ProximityStrategy};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "proximity": { "identityBinding": "strict" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WanderSafeSettings {
    /// Application name, used in log lines and the root route.
    pub name: String,
    /// HTTP / WebSocket server settings.
    pub server: ServerSettings,
    /// Proximity engine settings.
    pub proximity: ProximitySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for WanderSafeSettings {
    fn default() -> Self {
        Self {
            name: "wandersafe".to_string(),
            server: ServerSettings::default(),
            proximity: ProximitySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl WanderSafeSettings {
    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if s.heartbeat_timeout_secs < s.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) must not be below heartbeatIntervalSecs ({})",
                s.heartbeat_timeout_secs, s.heartbeat_interval_secs
            )));
        }
        if s.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if s.cors_origins.iter().any(|o| o.trim() == "*") {
            return Err(SettingsError::InvalidValue(
                "server.corsOrigins cannot contain \"*\" while credentials are allowed".into(),
            ));
        }
        if self.proximity.command_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "proximity.commandQueueCapacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and connection-lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a connection is treated as dead.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// How long graceful shutdown waits for tasks.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_capacity: 256,
            cors_origins: vec!["http://localhost:3000".to_string()],
            shutdown_timeout_secs: 30,
        }
    }
}

/// Proximity engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProximitySettings {
    /// Whether a connection may change its `userId` after the first report.
    pub identity_binding: IdentityBinding,
    /// Candidate enumeration strategy.
    pub strategy: ProximityStrategy,
    /// Drop reports whose coordinates fall outside the valid lat/lng ranges.
    pub validate_ranges: bool,
    /// Depth of the hub's command queue.
    pub command_queue_capacity: usize,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            identity_binding: IdentityBinding::default(),
            strategy: ProximityStrategy::default(),
            validate_ranges: false,
            command_queue_capacity: 1024,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` takes precedence).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
