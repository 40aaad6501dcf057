//! Live session state and inbound location reports.

use serde::Serialize;
use wandersafe_core::{ConnectionId, Coordinates, UserId};

/// One connection's most recent self-report.
///
/// Created on the first accepted report, fully replaced by each later one,
/// and dropped when the connection closes. Nothing here outlives the process.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Owning connection.
    #[serde(skip)]
    pub connection_id: ConnectionId,
    /// Client-asserted identity.
    pub user_id: UserId,
    /// Label shown to nearby users.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Last reported position.
    #[serde(rename = "location")]
    pub position: Coordinates,
}

/// A parsed `updateLocation` payload, not yet validated.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationReport {
    /// Claimed user.
    pub user_id: UserId,
    /// Display name (empty when the client sent none).
    pub name: String,
    /// Reported position. May still be non-finite or out of range.
    pub position: Coordinates,
}

impl LocationReport {
    /// Convenience constructor.
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            position: Coordinates { lat, lng },
        }
    }

    /// Turn the report into the session it describes.
    pub(crate) fn into_session(self, connection_id: ConnectionId) -> Session {
        Session {
            connection_id,
            user_id: self.user_id,
            display_name: self.name,
            position: self.position,
        }
    }
}
