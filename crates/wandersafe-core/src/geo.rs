//! Great-circle geometry on a spherical Earth.
//!
//! Every proximity decision in WanderSafe goes through [`haversine_km`]. The
//! arithmetic is written out term by term (no `powi`, no fused operations)
//! so results stay bit-identical across candidate strategies and platforms.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Inclusive radius within which another session counts as nearby.
pub const NEARBY_RADIUS_KM: f64 = 1.0;

/// A latitude/longitude pair in decimal degrees.
///
/// Serialized as `{"lat": .., "lng": ..}` to match the client wire format.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Build a coordinate pair. Returns `None` unless both values are finite.
    ///
    /// Out-of-range values (e.g. latitude 120) are accepted as-is.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        (lat.is_finite() && lng.is_finite()).then_some(Self { lat, lng })
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two points, in kilometres.
///
/// ```text
/// a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)
/// c = 2·atan2(√a, √(1−a))
/// d = 6371 · c
/// ```
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let half_lat = (d_lat / 2.0).sin();
    let half_lon = (d_lon / 2.0).sin();
    let a = half_lat * half_lat + lat1.cos() * lat2.cos() * half_lon * half_lon;
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Inclusive threshold test: exactly [`NEARBY_RADIUS_KM`] is nearby.
pub fn within_nearby_radius(distance_km: f64) -> bool {
    distance_km <= NEARBY_RADIUS_KM
}
