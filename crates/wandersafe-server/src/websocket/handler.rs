//! Inbound frame dispatch: decode client frames and forward reports to the hub.

use metrics::counter;
use tracing::{debug, instrument, warn};
use wandersafe_core::ConnectionId;
use wandersafe_proximity::{ClientMessage, ProximityHub, ReportRejection, parse_client_message};

use crate::metrics::{LOCATION_REPORTS_REJECTED_TOTAL, LOCATION_REPORTS_TOTAL};

/// What happened to one inbound frame.
#[derive(Debug, PartialEq)]
pub enum HandleOutcome {
    /// The report was queued on the hub.
    Forwarded,
    /// The frame could not be decoded and was dropped.
    Dropped(ReportRejection),
    /// The hub is gone (shutting down).
    HubUnavailable,
}

/// Handle an incoming WebSocket text frame.
///
/// Nothing is ever sent back to the client for a bad frame.
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn handle_message(
    text: &str,
    connection_id: &ConnectionId,
    hub: &ProximityHub,
) -> HandleOutcome {
    counter!(LOCATION_REPORTS_TOTAL).increment(1);

    let report = match parse_client_message(text) {
        Ok(ClientMessage::UpdateLocation(report)) => report,
        Err(rejection) => {
            counter!(LOCATION_REPORTS_REJECTED_TOTAL, "reason" => rejection.reason())
                .increment(1);
            debug!(reason = rejection.reason(), error = %rejection, "dropping inbound frame");
            return HandleOutcome::Dropped(rejection);
        }
    };

    match hub.report(connection_id.clone(), report).await {
        Ok(()) => HandleOutcome::Forwarded,
        Err(e) => {
            warn!(error = %e, "location report not forwarded");
            HandleOutcome::HubUnavailable
        }
    }
}
