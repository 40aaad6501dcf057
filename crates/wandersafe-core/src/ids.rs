//! Branded ID newtypes for type safety.
//!
//! A connection ID and a user ID are both strings on the wire, but mixing
//! them up is a real bug: the registry is keyed by connection, while the
//! nearby list reports users. Each gets its own newtype.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Transport-assigned identifier of one live WebSocket connection.
    ///
    /// Generated server-side at upgrade time. UUID v7 keeps IDs unique for
    /// the process lifetime and roughly ordered by connect time.
    ConnectionId
}

branded_id! {
    /// Client-asserted identity carried in location reports.
    UserId
}

impl ConnectionId {
    /// Allocate a fresh connection ID (`conn_` + UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_connection_ids_are_unique() {
        let ids: HashSet<ConnectionId> = (0..1000).map(|_| ConnectionId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn generated_connection_id_has_prefix() {
        let id = ConnectionId::generate();
        assert!(id.starts_with("conn_"));
    }

    #[test]
    fn serde_is_transparent() {
        let id = UserId::from("u_42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u_42\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_and_deref() {
        let id = ConnectionId::from("conn_a");
        assert_eq!(id.to_string(), "conn_a");
        assert_eq!(&*id, "conn_a");
        assert_eq!(id.as_str(), "conn_a");
    }

    #[test]
    fn ordering_follows_string_order() {
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        assert!(a < b);
    }

    #[test]
    fn into_inner_roundtrip() {
        let id = UserId::from_string("abc".into());
        let s: String = id.clone().into();
        assert_eq!(s, "abc");
        assert_eq!(id.into_inner(), "abc");
    }
}
