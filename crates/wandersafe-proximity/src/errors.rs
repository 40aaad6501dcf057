//! Proximity error types.

use thiserror::Error;
use wandersafe_core::UserId;

/// Why a location report was dropped without touching the registry.
///
/// Rejections are never sent back to the client. They are logged and
/// counted under `location_reports_rejected_total{reason}`.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReportRejection {
    /// Frame was not valid JSON or did not match the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Envelope `type` is not one the server understands.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// `userId` absent or empty.
    #[error("report has no userId")]
    MissingUserId,
    /// Latitude or longitude is NaN or infinite.
    #[error("coordinates are not finite")]
    NonFinite,
    /// Coordinates outside [-90, 90] / [-180, 180] with range checks on.
    #[error("coordinates out of range: ({lat}, {lng})")]
    OutOfRange {
        /// Reported latitude.
        lat: f64,
        /// Reported longitude.
        lng: f64,
    },
    /// Connection is bound to another user under strict identity binding.
    #[error("connection bound to {bound}, report claims {claimed}")]
    IdentityMismatch {
        /// User the connection was first seen as.
        bound: UserId,
        /// User the rejected report claimed.
        claimed: UserId,
    },
}

impl ReportRejection {
    /// Metric label for this rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingUserId => "missing_user_id",
            Self::NonFinite => "non_finite",
            Self::OutOfRange { .. } => "out_of_range",
            Self::IdentityMismatch { .. } => "identity_mismatch",
        }
    }
}

/// Why one nearby update could not be handed to its viewer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The viewer's connection is already gone.
    #[error("connection not found")]
    UnknownConnection,
    /// The viewer's outbound queue is full or closed.
    #[error("outbound queue full or closed")]
    QueueFull,
    /// The update could not be encoded.
    #[error("failed to encode update: {0}")]
    Encode(String),
}

/// Errors talking to the proximity hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub task has stopped (cancelled or panicked).
    #[error("proximity hub is not running")]
    Closed,
}
