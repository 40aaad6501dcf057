//! Synchronous proximity state machine.
//!
//! [`ProximityEngine`] applies reports and disconnects to the registry and
//! computes the resulting nearby lists. It does no I/O; the hub drives it
//! and performs delivery.

use wandersafe_core::{ConnectionId, IdentityBinding, ProximityStrategy};

use crate::errors::ReportRejection;
use crate::nearby::{NearbyUpdate, compute_nearby};
use crate::registry::{RegistrySnapshot, SessionRegistry};
use crate::session::LocationReport;

/// Engine policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Whether a connection may switch `userId`.
    pub identity_binding: IdentityBinding,
    /// Candidate enumeration.
    pub strategy: ProximityStrategy,
    /// Reject coordinates outside the valid lat/lng ranges.
    pub validate_ranges: bool,
}

/// Registry plus policy.
#[derive(Debug, Default)]
pub struct ProximityEngine {
    registry: SessionRegistry,
    config: EngineConfig,
}

impl ProximityEngine {
    /// Empty engine with the given policy.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            config,
        }
    }

    /// Active policy.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Validate and apply one report.
    ///
    /// On success the connection's session is created or fully replaced. On
    /// rejection the registry is left untouched.
    pub fn apply_report(
        &mut self,
        connection_id: &ConnectionId,
        report: LocationReport,
    ) -> Result<(), ReportRejection> {
        if report.user_id.is_empty() {
            return Err(ReportRejection::MissingUserId);
        }
        let position = report.position;
        if !position.is_finite() {
            return Err(ReportRejection::NonFinite);
        }
        if self.config.validate_ranges && !position.in_range() {
            return Err(ReportRejection::OutOfRange {
                lat: position.lat,
                lng: position.lng,
            });
        }
        if self.config.identity_binding == IdentityBinding::Strict {
            if let Some(existing) = self.registry.get(connection_id) {
                if existing.user_id != report.user_id {
                    return Err(ReportRejection::IdentityMismatch {
                        bound: existing.user_id.clone(),
                        claimed: report.user_id,
                    });
                }
            }
        }
        let _ = self
            .registry
            .upsert(report.into_session(connection_id.clone()));
        Ok(())
    }

    /// Drop a connection's session. Returns `true` if one existed.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> bool {
        self.registry.remove(connection_id).is_some()
    }

    /// Point-in-time copy of the registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Nearby lists for every viewer in the current registry.
    pub fn compute(&self) -> Vec<NearbyUpdate> {
        compute_nearby(&self.snapshot(), self.config.strategy)
    }
}
