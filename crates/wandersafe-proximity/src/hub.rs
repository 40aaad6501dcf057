//! Proximity hub: the single task that owns the session registry.
//!
//! Connection tasks talk to the hub through a cloneable [`ProximityHub`]
//! handle. Commands are applied strictly one at a time in arrival order, and
//! every registry mutation is followed by a full recompute and fan-out
//! before the next command is read. A broadcast therefore never observes a
//! half-applied mutation, and a disconnect is never overtaken by a later
//! cycle that still contains the departed session.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use wandersafe_core::ConnectionId;

use crate::engine::{EngineConfig, ProximityEngine};
use crate::errors::{DeliveryError, HubError};
use crate::metrics::{
    LOCATION_REPORTS_REJECTED_TOTAL, PROXIMITY_BROADCAST_CYCLES_TOTAL,
    PROXIMITY_BROADCAST_DURATION_SECONDS, PROXIMITY_SESSIONS_ACTIVE,
};
use crate::nearby::NearbyUpdate;
use crate::registry::RegistrySnapshot;
use crate::session::LocationReport;

/// Destination for computed nearby lists.
///
/// Implementations must not block: a slow viewer should fail fast rather
/// than hold up the rest of the cycle.
#[async_trait]
pub trait NearbySink: Send + Sync {
    /// Hand one viewer its full nearby list.
    async fn deliver(&self, update: &NearbyUpdate) -> Result<(), DeliveryError>;
}

/// Hub construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct HubConfig {
    /// Registry policy.
    pub engine: EngineConfig,
    /// Depth of the command queue.
    pub command_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            command_queue_capacity: 1024,
        }
    }
}

#[derive(Debug)]
enum HubCommand {
    Report {
        connection_id: ConnectionId,
        report: LocationReport,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
}

/// Handle to a running hub. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ProximityHub {
    tx: mpsc::Sender<HubCommand>,
}

impl ProximityHub {
    /// Start the hub task.
    ///
    /// The task exits when `cancel` fires or every handle is dropped.
    pub fn spawn(
        config: HubConfig,
        sink: Arc<dyn NearbySink>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let actor = HubActor {
            engine: ProximityEngine::new(config.engine),
            sink,
            rx,
            cancel,
        };
        let handle = tokio::spawn(actor.run());
        (Self { tx }, handle)
    }

    /// Queue a location report for `connection_id`.
    ///
    /// Returns once the command is queued. Validation failures are logged
    /// and counted by the hub, never returned here.
    pub async fn report(
        &self,
        connection_id: ConnectionId,
        report: LocationReport,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Report {
            connection_id,
            report,
        })
        .await
    }

    /// Queue removal of `connection_id`'s session.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { connection_id }).await
    }

    /// Registry snapshot taken after every previously queued command.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }
}

struct HubActor {
    engine: ProximityEngine,
    sink: Arc<dyn NearbySink>,
    rx: mpsc::Receiver<HubCommand>,
    cancel: CancellationToken,
}

impl HubActor {
    #[instrument(skip_all, name = "proximity_hub")]
    async fn run(mut self) {
        info!(
            strategy = ?self.engine.config().strategy,
            identity_binding = ?self.engine.config().identity_binding,
            "proximity hub started"
        );
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("proximity hub cancelled");
                    break;
                }
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        info!("all hub handles dropped, exiting");
                        break;
                    }
                }
            }
        }
        gauge!(PROXIMITY_SESSIONS_ACTIVE).set(0.0);
    }

    async fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Report {
                connection_id,
                report,
            } => self.on_report(&connection_id, report).await,
            HubCommand::Disconnect { connection_id } => self.on_disconnect(&connection_id).await,
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
        }
    }

    #[instrument(skip_all, fields(connection_id = %connection_id))]
    async fn on_report(&mut self, connection_id: &ConnectionId, report: LocationReport) {
        let user_id = report.user_id.clone();
        match self.engine.apply_report(connection_id, report) {
            Ok(()) => {
                debug!(user_id = %user_id, "location updated");
                self.broadcast().await;
            }
            Err(rejection) => {
                counter!(LOCATION_REPORTS_REJECTED_TOTAL, "reason" => rejection.reason())
                    .increment(1);
                warn!(user_id = %user_id, reason = rejection.reason(), error = %rejection, "location report dropped");
            }
        }
    }

    #[instrument(skip_all, fields(connection_id = %connection_id))]
    async fn on_disconnect(&mut self, connection_id: &ConnectionId) {
        if self.engine.disconnect(connection_id) {
            debug!("session removed");
            self.broadcast().await;
        } else {
            debug!("disconnect without session");
        }
    }

    /// Recompute every viewer's list and deliver them concurrently.
    async fn broadcast(&self) {
        let started = Instant::now();
        let sessions = self.engine.session_count();
        gauge!(PROXIMITY_SESSIONS_ACTIVE).set(sessions as f64);

        let updates = self.engine.compute();
        let sink = &self.sink;
        let results = join_all(updates.iter().map(|update| sink.deliver(update))).await;

        let mut failed = 0usize;
        for (update, result) in updates.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                debug!(viewer = %update.connection_id, error = %e, "nearby update not delivered");
            }
        }

        counter!(PROXIMITY_BROADCAST_CYCLES_TOTAL).increment(1);
        histogram!(PROXIMITY_BROADCAST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(sessions, recipients = updates.len(), failed, "broadcast cycle complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use tracing::Level;
    use wandersafe_core::logging::capture_logs;
    use wandersafe_core::{IdentityBinding, ProximityStrategy};

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<NearbyUpdate>>,
        failing: Mutex<HashSet<ConnectionId>>,
    }

    impl RecordingSink {
        fn latest(&self, conn: &str) -> Option<NearbyUpdate> {
            self.delivered
                .lock()
                .iter()
                .rev()
                .find(|u| u.connection_id.as_str() == conn)
                .cloned()
        }

        fn count_for(&self, conn: &str) -> usize {
            self.delivered
                .lock()
                .iter()
                .filter(|u| u.connection_id.as_str() == conn)
                .count()
        }

        fn total(&self) -> usize {
            self.delivered.lock().len()
        }
    }

    #[async_trait]
    impl NearbySink for RecordingSink {
        async fn deliver(&self, update: &NearbyUpdate) -> Result<(), DeliveryError> {
            if self.failing.lock().contains(&update.connection_id) {
                return Err(DeliveryError::QueueFull);
            }
            self.delivered.lock().push(update.clone());
            Ok(())
        }
    }

    fn start(config: HubConfig) -> (ProximityHub, Arc<RecordingSink>, CancellationToken, JoinHandle<()>) {
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let (hub, handle) = ProximityHub::spawn(config, sink.clone(), cancel.clone());
        (hub, sink, cancel, handle)
    }

    fn nearby_users(update: &NearbyUpdate) -> Vec<String> {
        update.nearby.iter().map(|e| e.user_id.to_string()).collect()
    }

    async fn report(hub: &ProximityHub, conn: &str, user: &str, lat: f64, lng: f64) {
        hub.report(conn.into(), LocationReport::new(user, user, lat, lng))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pune_scenario_end_to_end() {
        let (hub, sink, _cancel, _handle) = start(HubConfig::default());
        report(&hub, "conn_a", "A", 18.5204, 73.8567).await;
        report(&hub, "conn_b", "B", 18.5210, 73.8570).await;
        report(&hub, "conn_c", "C", 18.6000, 73.9000).await;
        let snap = hub.snapshot().await.unwrap();
        assert_eq!(snap.len(), 3);

        assert_eq!(nearby_users(&sink.latest("conn_a").unwrap()), ["B"]);
        assert_eq!(nearby_users(&sink.latest("conn_b").unwrap()), ["A"]);
        assert!(sink.latest("conn_c").unwrap().nearby.is_empty());

        hub.disconnect("conn_b".into()).await.unwrap();
        let snap = hub.snapshot().await.unwrap();
        assert_eq!(snap.len(), 2);
        assert!(snap.get(&"conn_b".into()).is_none());
        assert!(sink.latest("conn_a").unwrap().nearby.is_empty());
    }

    #[tokio::test]
    async fn every_viewer_gets_a_list_each_cycle() {
        let (hub, sink, _cancel, _handle) = start(HubConfig::default());
        report(&hub, "c1", "u1", 0.0, 0.0).await;
        report(&hub, "c2", "u2", 50.0, 50.0).await;
        let _ = hub.snapshot().await.unwrap();
        // Cycle 1 reaches c1; cycle 2 reaches c1 and c2.
        assert_eq!(sink.count_for("c1"), 2);
        assert_eq!(sink.count_for("c2"), 1);
    }

    #[tokio::test]
    async fn rejected_report_does_not_broadcast() {
        let (hub, sink, _cancel, _handle) = start(HubConfig::default());
        report(&hub, "c1", "u1", 0.0, 0.0).await;
        hub.report("c1".into(), LocationReport::new("u1", "", f64::NAN, 0.0))
            .await
            .unwrap();
        let snap = hub.snapshot().await.unwrap();
        assert_eq!(sink.total(), 1);
        assert_eq!(snap.sessions()[0].position.lat, 0.0);
    }

    #[tokio::test]
    async fn disconnect_without_session_is_quiet() {
        let (hub, sink, _cancel, _handle) = start(HubConfig::default());
        report(&hub, "c1", "u1", 0.0, 0.0).await;
        hub.disconnect("never_reported".into()).await.unwrap();
        let _ = hub.snapshot().await.unwrap();
        assert_eq!(sink.total(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_is_isolated() {
        let (hub, sink, _cancel, _handle) = start(HubConfig::default());
        let _ = sink.failing.lock().insert("c2".into());
        report(&hub, "c1", "u1", 10.0, 10.0).await;
        report(&hub, "c2", "u2", 10.0, 10.001).await;
        report(&hub, "c3", "u3", 10.001, 10.0).await;
        let snap = hub.snapshot().await.unwrap();

        assert_eq!(snap.len(), 3);
        assert_eq!(sink.count_for("c2"), 0);
        assert_eq!(nearby_users(&sink.latest("c1").unwrap()), ["u2", "u3"]);
        assert_eq!(nearby_users(&sink.latest("c3").unwrap()), ["u1", "u2"]);
    }

    #[tokio::test]
    async fn strict_binding_drops_identity_switch() {
        let config = HubConfig {
            engine: EngineConfig {
                identity_binding: IdentityBinding::Strict,
                ..EngineConfig::default()
            },
            ..HubConfig::default()
        };
        let (logs, _guard) = capture_logs();
        let (hub, _sink, _cancel, _handle) = start(config);
        report(&hub, "c1", "alice", 0.0, 0.0).await;
        report(&hub, "c1", "mallory", 0.0, 0.0).await;
        let snap = hub.snapshot().await.unwrap();
        assert_eq!(snap.sessions()[0].user_id.as_str(), "alice");

        let warning = logs.find(Level::WARN, "location report dropped").unwrap();
        assert_eq!(warning.field("reason"), Some("identity_mismatch"));
        assert_eq!(warning.field("user_id"), Some("mallory"));
    }

    #[tokio::test]
    async fn rejections_and_cycles_are_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _metrics = metrics::set_default_local_recorder(&recorder);
        let config = HubConfig {
            engine: EngineConfig {
                identity_binding: IdentityBinding::Strict,
                ..EngineConfig::default()
            },
            ..HubConfig::default()
        };
        let (hub, _sink, _cancel, _handle) = start(config);
        report(&hub, "c1", "alice", 0.0, 0.0).await;
        report(&hub, "c1", "mallory", 0.0, 0.0).await;
        let _ = hub.snapshot().await.unwrap();

        let output = handle.render();
        assert!(
            output.contains(&format!(
                "{LOCATION_REPORTS_REJECTED_TOTAL}{{reason=\"identity_mismatch\"}} 1"
            )),
            "{output}"
        );
        assert!(output.contains(&format!("{PROXIMITY_BROADCAST_CYCLES_TOTAL} 1")), "{output}");
    }

    #[tokio::test]
    async fn bands_strategy_matches_scan_through_hub() {
        let config = HubConfig {
            engine: EngineConfig {
                strategy: ProximityStrategy::LatitudeBands,
                ..EngineConfig::default()
            },
            ..HubConfig::default()
        };
        let (hub, sink, _cancel, _handle) = start(config);
        report(&hub, "conn_a", "A", 18.5204, 73.8567).await;
        report(&hub, "conn_b", "B", 18.5210, 73.8570).await;
        let _ = hub.snapshot().await.unwrap();
        assert_eq!(nearby_users(&sink.latest("conn_a").unwrap()), ["B"]);
    }

    #[tokio::test]
    async fn cancel_stops_hub() {
        let (hub, _sink, cancel, handle) = start(HubConfig::default());
        cancel.cancel();
        handle.await.unwrap();
        assert!(matches!(hub.snapshot().await, Err(HubError::Closed)));
        assert!(matches!(
            hub.disconnect("c1".into()).await,
            Err(HubError::Closed)
        ));
    }

    #[tokio::test]
    async fn dropping_handles_stops_hub() {
        let (hub, _sink, _cancel, handle) = start(HubConfig::default());
        drop(hub);
        handle.await.unwrap();
    }
}
