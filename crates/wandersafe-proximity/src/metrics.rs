//! Metric names recorded by the proximity hub.
//!
//! The server re-exports these next to its own names, so `/metrics` has a
//! single source for every series.

/// Inbound reports dropped (counter, labels: reason).
pub const LOCATION_REPORTS_REJECTED_TOTAL: &str = "location_reports_rejected_total";
/// Sessions in the registry (gauge).
pub const PROXIMITY_SESSIONS_ACTIVE: &str = "proximity_sessions_active";
/// Recompute-and-fan-out cycles run (counter).
pub const PROXIMITY_BROADCAST_CYCLES_TOTAL: &str = "proximity_broadcast_cycles_total";
/// Time spent per cycle (histogram).
pub const PROXIMITY_BROADCAST_DURATION_SECONDS: &str = "proximity_broadcast_duration_seconds";
