//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wandersafe_settings::ServerSettings;

/// Runtime configuration for [`WanderSafeServer`](crate::server::WanderSafeServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this long without any sign of life.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Graceful shutdown budget in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_capacity: 256,
            cors_origins: vec!["http://localhost:3000".into()],
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Heartbeat timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Shutdown budget as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_message_size: s.max_message_size,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            send_queue_capacity: s.send_queue_capacity,
            cors_origins: s.cors_origins.clone(),
            shutdown_timeout_secs: s.shutdown_timeout_secs,
        }
    }
}
