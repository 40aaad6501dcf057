//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use wandersafe_core::ConnectionId;
use wandersafe_proximity::ProximityHub;
use wandersafe_proximity::protocol::connection_established;

use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_message;
use super::heartbeat::{HeartbeatResult, run_heartbeat};

/// Everything a session needs besides the socket itself.
#[derive(Clone)]
pub struct SessionContext {
    /// Proximity hub handle.
    pub hub: ProximityHub,
    /// Live connection table and fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Interval between server Ping frames and liveness checks.
    pub heartbeat_interval: Duration,
    /// Silence after which the client is dropped.
    pub heartbeat_timeout: Duration,
    /// Outbound queue depth.
    pub send_queue_capacity: usize,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Sends `connection.established` with the client ID
/// 2. Forwards `updateLocation` frames to the proximity hub
/// 3. Drains the outbound queue and sends periodic Pings
/// 4. Closes on client close, heartbeat timeout, slow-consumer eviction,
///    or server shutdown
/// 5. Removes the session from the hub, which rebroadcasts to survivors
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(ws: WebSocket, client_id: ConnectionId, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));
    let closed = connection.close_token();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    ctx.broadcast.add(connection.clone()).await;

    match connection_established(client_id.as_str()) {
        Ok(json) => {
            let _ = ws_tx.send(Message::Text(json.into())).await;
        }
        Err(e) => warn!(error = %e, "failed to serialize connection.established"),
    }

    // Outbound forwarder with periodic Ping frames.
    let ping_every = ctx.heartbeat_interval.max(Duration::from_millis(1));
    let outbound_closed = closed.clone();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Liveness watchdog.
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat = {
        let conn = connection.clone();
        let cancel = heartbeat_cancel.clone();
        let (interval, timeout) = (ctx.heartbeat_interval, ctx.heartbeat_timeout);
        tokio::spawn(async move {
            if run_heartbeat(conn.clone(), interval, timeout, cancel).await
                == HeartbeatResult::TimedOut
            {
                warn!(
                    silent_for = ?conn.last_seen_elapsed(),
                    "client unresponsive, disconnecting"
                );
                conn.close();
            }
        })
    };

    // Process incoming messages
    loop {
        let msg = tokio::select! {
            () = closed.cancelled() => {
                debug!("connection closed by server");
                break;
            }
            () = ctx.shutdown.cancelled() => {
                debug!("server shutting down");
                connection.close();
                break;
            }
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };
        connection.mark_alive();

        // Binary frames carrying UTF-8 JSON are accepted too
        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let _ = handle_message(&text, &client_id, &ctx.hub).await;
    }

    // Clean up
    connection.close();
    if let Err(e) = ctx.hub.disconnect(client_id.clone()).await {
        debug!(error = %e, "hub unavailable during disconnect");
    }
    ctx.broadcast.remove(&client_id).await;
    heartbeat_cancel.cancel();
    let _ = heartbeat.await;
    // The forwarder gets a moment to flush its Close frame.
    let outbound_abort = outbound.abort_handle();
    if tokio::time::timeout(Duration::from_millis(100), outbound).await.is_err() {
        outbound_abort.abort();
    }

    info!(
        dropped = connection.drop_count(),
        connected_for = ?connection.age(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}
