//! Per-viewer nearby computation over a registry snapshot.

use serde::Serialize;
use wandersafe_core::{
    ConnectionId, Coordinates, ProximityStrategy, UserId, haversine_km, within_nearby_radius,
};

use crate::bands::LatitudeBands;
use crate::registry::RegistrySnapshot;

/// One other user within range of a viewer, as sent to the client.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyEntry {
    /// The nearby user.
    pub user_id: UserId,
    /// Their display name.
    pub name: String,
    /// Their last reported position.
    pub location: Coordinates,
    /// Great-circle distance from the viewer, in kilometres.
    pub distance_km: f64,
}

/// The full nearby list for one viewer. Replaces whatever it had before.
#[derive(Clone, Debug, PartialEq)]
pub struct NearbyUpdate {
    /// Recipient connection.
    pub connection_id: ConnectionId,
    /// Everyone within range, ordered by their connection ID.
    pub nearby: Vec<NearbyEntry>,
}

/// Compute every viewer's nearby list.
///
/// Updates come out in viewer connection order, one per session in the
/// snapshot, including viewers whose list is empty.
pub fn compute_nearby(snapshot: &RegistrySnapshot, strategy: ProximityStrategy) -> Vec<NearbyUpdate> {
    match strategy {
        ProximityStrategy::Scan => collect(snapshot, |viewer| {
            (0..snapshot.len()).filter(move |&j| j != viewer).collect()
        }),
        ProximityStrategy::LatitudeBands => {
            let bands = LatitudeBands::build(snapshot.sessions());
            collect(snapshot, |viewer| bands.candidates(viewer))
        }
    }
}

/// Shared evaluation: candidate indices must be ascending and exclude the viewer.
fn collect(
    snapshot: &RegistrySnapshot,
    candidates: impl Fn(usize) -> Vec<usize>,
) -> Vec<NearbyUpdate> {
    let sessions = snapshot.sessions();
    sessions
        .iter()
        .enumerate()
        .map(|(i, viewer)| {
            let nearby = candidates(i)
                .into_iter()
                .filter_map(|j| {
                    let other = &sessions[j];
                    let distance_km = haversine_km(viewer.position, other.position);
                    within_nearby_radius(distance_km).then(|| NearbyEntry {
                        user_id: other.user_id.clone(),
                        name: other.display_name.clone(),
                        location: other.position,
                        distance_km,
                    })
                })
                .collect();
            NearbyUpdate {
                connection_id: viewer.connection_id.clone(),
                nearby,
            }
        })
        .collect()
}
