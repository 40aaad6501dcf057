//! Nearby-list fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use wandersafe_core::ConnectionId;
use wandersafe_proximity::protocol::nearby_users_update;
use wandersafe_proximity::{DeliveryError, NearbySink, NearbyUpdate};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Maximum total lifetime message drops before forcibly disconnecting a slow client.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Tracks live connections and delivers frames to them.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Atomic counter tracking total connections (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        if conns.remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Look up a live connection.
    pub async fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(connection_id).cloned()
    }

    /// Enqueue one serialized frame for one client.
    ///
    /// A client that has dropped [`MAX_TOTAL_DROPS`] frames is closed and
    /// removed; its session task then runs the normal disconnect path.
    pub async fn send_to(
        &self,
        connection_id: &ConnectionId,
        json: Arc<String>,
    ) -> Result<(), DeliveryError> {
        let Some(conn) = self.get(connection_id).await else {
            return Err(DeliveryError::UnknownConnection);
        };
        if conn.send(json) {
            return Ok(());
        }

        counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
        let drops = conn.drop_count();
        if drops >= MAX_TOTAL_DROPS {
            warn!(conn_id = %conn.id, drops, "disconnecting slow client");
            conn.close();
            self.remove(connection_id).await;
        } else {
            warn!(conn_id = %conn.id, total_drops = drops, "failed to send to client (channel full)");
        }
        Err(DeliveryError::QueueFull)
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NearbySink for BroadcastManager {
    async fn deliver(&self, update: &NearbyUpdate) -> Result<(), DeliveryError> {
        let json = nearby_users_update(&update.nearby).map_err(|e| {
            warn!(viewer = %update.connection_id, error = %e, "failed to serialize nearby update");
            DeliveryError::Encode(e.to_string())
        })?;
        debug!(viewer = %update.connection_id, nearby = update.nearby.len(), "nearby update");
        self.send_to(&update.connection_id, Arc::new(json)).await
    }
}
