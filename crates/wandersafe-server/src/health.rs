//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the hub is running, `"degraded"` otherwise.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Connections that have reported a location.
    pub active_sessions: usize,
}

/// Build a health response from live counters.
///
/// `sessions` is `None` when the proximity hub could not be reached.
pub fn health_check(start_time: Instant, connections: usize, sessions: Option<usize>) -> HealthResponse {
    HealthResponse {
        status: if sessions.is_some() { "ok" } else { "degraded" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_sessions: sessions.unwrap_or(0),
    }
}
