//! # wandersafe-proximity
//!
//! Real-time "who is near me" for connected tourists.
//!
//! - [`SessionRegistry`]: live sessions keyed by connection, with immutable
//!   [`RegistrySnapshot`]s
//! - [`compute_nearby`]: per-viewer lists of everyone within 1 km
//! - [`ProximityEngine`]: report validation and identity policy
//! - [`ProximityHub`]: the actor that owns the registry, serializes
//!   mutations, and fans results out through a [`NearbySink`]
//! - [`protocol`]: the JSON envelope spoken over the WebSocket

#![deny(unsafe_code)]

mod bands;
pub mod engine;
pub mod errors;
pub mod hub;
pub mod metrics;
pub mod nearby;
pub mod protocol;
pub mod registry;
pub mod session;

pub use engine::{EngineConfig, ProximityEngine};
pub use errors::{DeliveryError, HubError, ReportRejection};
pub use hub::{HubConfig, NearbySink, ProximityHub};
pub use nearby::{NearbyEntry, NearbyUpdate, compute_nearby};
pub use protocol::{ClientMessage, parse_client_message};
pub use registry::{RegistrySnapshot, SessionRegistry};
pub use session::{LocationReport, Session};
