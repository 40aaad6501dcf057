//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::Result;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Frames dropped because a client's outbound queue was full (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Inbound frames received (counter).
pub const LOCATION_REPORTS_TOTAL: &str = "location_reports_total";
pub use wandersafe_proximity::metrics::{
    LOCATION_REPORTS_REJECTED_TOTAL, PROXIMITY_BROADCAST_CYCLES_TOTAL,
    PROXIMITY_BROADCAST_DURATION_SECONDS, PROXIMITY_SESSIONS_ACTIVE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        // Local recorder: no global install, so tests don't conflict.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(WS_CONNECTIONS_TOTAL).increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("ws_connections_total 2"), "{output}");
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_BROADCAST_DROPS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            LOCATION_REPORTS_TOTAL,
            LOCATION_REPORTS_REJECTED_TOTAL,
            PROXIMITY_SESSIONS_ACTIVE,
            PROXIMITY_BROADCAST_CYCLES_TOTAL,
            PROXIMITY_BROADCAST_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
