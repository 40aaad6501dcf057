//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client showed no sign of life within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Consecutive silent intervals tolerated before giving up.
fn max_missed(interval: Duration, timeout: Duration) -> u128 {
    (timeout.as_millis() / interval.as_millis().max(1)).max(1)
}

/// Watch a connection's alive flag.
///
/// At each `interval` tick the flag is checked and reset. Once
/// `timeout / interval` consecutive ticks pass with no sign of life the
/// connection is considered dead.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval.max(Duration::from_millis(1)));
    let limit = max_missed(interval, timeout);
    let mut missed: u128 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= limit {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
