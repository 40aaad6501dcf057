//! # wandersafe-core
//!
//! Foundation types shared by every WanderSafe crate:
//!
//! - **Branded IDs**: [`ConnectionId`] and [`UserId`] as newtypes for type safety
//! - **Geodesy**: [`Coordinates`] and the haversine great-circle distance
//! - **Policy**: [`IdentityBinding`] and [`ProximityStrategy`] switches
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod geo;
pub mod ids;
pub mod logging;
pub mod policy;

pub use geo::{Coordinates, EARTH_RADIUS_KM, NEARBY_RADIUS_KM, haversine_km, within_nearby_radius};
pub use ids::{ConnectionId, UserId};
pub use policy::{IdentityBinding, ProximityStrategy};
