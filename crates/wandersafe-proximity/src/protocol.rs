//! WebSocket wire contract.
//!
//! Every frame is a JSON envelope:
//!
//! ```json
//! {"type": "updateLocation", "timestamp": "2026-01-01T00:00:00Z", "data": {...}}
//! ```
//!
//! `timestamp` is optional inbound and always present outbound.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wandersafe_core::{Coordinates, UserId};

use crate::errors::ReportRejection;
use crate::nearby::NearbyEntry;
use crate::session::LocationReport;

/// Sent once, right after the upgrade.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";
/// Client → server location report.
pub const UPDATE_LOCATION: &str = "updateLocation";
/// Server → client nearby list.
pub const NEARBY_USERS_UPDATE: &str = "nearbyUsersUpdate";

/// A decoded client frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    /// `updateLocation`
    UpdateLocation(LocationReport),
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLocationData {
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    name: Option<String>,
    location: WireLocation,
}

#[derive(Deserialize)]
struct WireLocation {
    lat: f64,
    lng: f64,
}

/// Decode one inbound text frame.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ReportRejection> {
    let envelope: InboundEnvelope =
        serde_json::from_str(text).map_err(|e| ReportRejection::Malformed(e.to_string()))?;

    match envelope.kind.as_str() {
        UPDATE_LOCATION => {
            let data: UpdateLocationData = serde_json::from_value(envelope.data)
                .map_err(|e| ReportRejection::Malformed(e.to_string()))?;
            let user_id = data
                .user_id
                .filter(|u| !u.is_empty())
                .ok_or(ReportRejection::MissingUserId)?;
            Ok(ClientMessage::UpdateLocation(LocationReport {
                user_id,
                name: data.name.unwrap_or_default(),
                position: Coordinates {
                    lat: data.location.lat,
                    lng: data.location.lng,
                },
            }))
        }
        other => Err(ReportRejection::UnknownType(other.to_string())),
    }
}

/// Outbound envelope.
#[derive(Debug, Serialize)]
pub struct ServerEnvelope<'a, T: Serialize> {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// RFC 3339 send time.
    pub timestamp: String,
    /// Payload.
    pub data: T,
}

impl<'a, T: Serialize> ServerEnvelope<'a, T> {
    /// Wrap `data` with the current time.
    pub fn new(kind: &'a str, data: T) -> Self {
        Self {
            kind,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Established<'a> {
    client_id: &'a str,
}

/// `connection.established` frame for a new client.
pub fn connection_established(client_id: &str) -> serde_json::Result<String> {
    ServerEnvelope::new(CONNECTION_ESTABLISHED, Established { client_id }).to_json()
}

/// `nearbyUsersUpdate` frame carrying a viewer's full nearby list.
pub fn nearby_users_update(nearby: &[NearbyEntry]) -> serde_json::Result<String> {
    ServerEnvelope::new(NEARBY_USERS_UPDATE, nearby).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_update_location() {
        let msg = parse_client_message(
            r#"{"type":"updateLocation","data":{"userId":"u1","name":"Asha","location":{"lat":18.5,"lng":73.8}}}"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::UpdateLocation(LocationReport::new("u1", "Asha", 18.5, 73.8)));
    }

    #[test]
    fn timestamp_and_extra_fields_are_ignored() {
        let msg = parse_client_message(
            r#"{"type":"updateLocation","timestamp":"2026-01-01T00:00:00Z","data":{"userId":"u1","location":{"lat":1,"lng":2},"accuracy":5}}"#,
        )
        .unwrap();
        let ClientMessage::UpdateLocation(report) = msg;
        assert_eq!(report.position, Coordinates { lat: 1.0, lng: 2.0 });
    }

    #[test]
    fn name_defaults_to_empty() {
        for name in ["", r#","name":null"#] {
            let text = format!(
                r#"{{"type":"updateLocation","data":{{"userId":"u1"{name},"location":{{"lat":0,"lng":0}}}}}}"#
            );
            let ClientMessage::UpdateLocation(report) = parse_client_message(&text).unwrap();
            assert_eq!(report.name, "");
        }
    }

    #[test]
    fn missing_or_empty_user_id_rejected() {
        assert_matches!(
            parse_client_message(r#"{"type":"updateLocation","data":{"location":{"lat":0,"lng":0}}}"#),
            Err(ReportRejection::MissingUserId)
        );
        assert_matches!(
            parse_client_message(
                r#"{"type":"updateLocation","data":{"userId":"","location":{"lat":0,"lng":0}}}"#
            ),
            Err(ReportRejection::MissingUserId)
        );
    }

    #[test]
    fn bad_location_is_malformed() {
        for data in [
            r#"{"userId":"u1"}"#,
            r#"{"userId":"u1","location":{"lat":"18.5","lng":73.8}}"#,
            r#"{"userId":"u1","location":{"lat":18.5}}"#,
            r#"{"userId":"u1","location":null}"#,
        ] {
            let text = format!(r#"{{"type":"updateLocation","data":{data}}}"#);
            assert_matches!(parse_client_message(&text), Err(ReportRejection::Malformed(_)), "{data}");
        }
    }

    #[test]
    fn non_json_is_malformed() {
        assert_matches!(parse_client_message("not json"), Err(ReportRejection::Malformed(_)));
        assert_matches!(parse_client_message("[1,2]"), Err(ReportRejection::Malformed(_)));
        assert_matches!(parse_client_message(r#"{"data":{}}"#), Err(ReportRejection::Malformed(_)));
    }

    #[test]
    fn unknown_type_rejected() {
        assert_matches!(
            parse_client_message(r#"{"type":"sos","data":{}}"#),
            Err(ReportRejection::UnknownType(t)) if t == "sos"
        );
    }

    #[test]
    fn established_frame_shape() {
        let json: Value = serde_json::from_str(&connection_established("conn_1").unwrap()).unwrap();
        assert_eq!(json["type"], CONNECTION_ESTABLISHED);
        assert_eq!(json["data"]["clientId"], "conn_1");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn nearby_frame_shape() {
        let entries = vec![NearbyEntry {
            user_id: "u2".into(),
            name: "Ravi".into(),
            location: Coordinates { lat: 1.0, lng: 2.0 },
            distance_km: 0.5,
        }];
        let json: Value = serde_json::from_str(&nearby_users_update(&entries).unwrap()).unwrap();
        assert_eq!(json["type"], NEARBY_USERS_UPDATE);
        assert_eq!(
            json["data"],
            serde_json::json!([{"userId": "u2", "name": "Ravi", "location": {"lat": 1.0, "lng": 2.0}, "distanceKm": 0.5}])
        );
    }

    #[test]
    fn empty_nearby_frame_is_empty_array() {
        let json: Value = serde_json::from_str(&nearby_users_update(&[]).unwrap()).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
    }
}
