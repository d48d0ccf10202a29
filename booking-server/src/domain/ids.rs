//! Identifier types.
//!
//! Every aggregate is keyed by its own UUID newtype so that a `TicketId`
//! can never be passed where a `ParcelId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from the hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(
    /// Identifies a bus in the fleet.
    BusId
);
uuid_id!(
    /// Identifies a scheduled connection.
    ConnectionId
);
uuid_id!(
    /// Identifies a configured country.
    CountryId
);
uuid_id!(
    /// Identifies a physical seat on a bus.
    SeatId
);
uuid_id!(
    /// Identifies a passenger ticket.
    TicketId
);
uuid_id!(
    /// Identifies a parcel shipment.
    ParcelId
);
uuid_id!(
    /// Identifies a pick-up or drop-off stop.
    StopId
);
uuid_id!(
    /// Identifies a passenger record.
    PassengerId
);
uuid_id!(
    /// Identifies a postal address record.
    AddressId
);
uuid_id!(
    /// Identifies one purchase attempt (a group of rows held together).
    PurchaseId
);

/// Error returned when a payment session id is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session id: must not be empty")]
pub struct InvalidSessionId;

/// A checkout session identifier issued by the payment provider.
///
/// Opaque to us; the only requirement is that it is non-empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id, rejecting empty strings.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidSessionId> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidSessionId);
        }
        Ok(Self(s))
    }

    /// Returns the session id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = InvalidSessionId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(TicketId::new(), TicketId::new());
    }

    #[test]
    fn parse_roundtrip() {
        let id = ConnectionId::new();
        let parsed = ConnectionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(BusId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn debug_names_the_type() {
        let uuid = Uuid::nil();
        let id = SeatId::from_uuid(uuid);
        assert_eq!(
            format!("{:?}", id),
            "SeatId(00000000-0000-0000-0000-000000000000)"
        );
    }

    #[test]
    fn session_id_rejects_empty() {
        assert!(SessionId::new("").is_err());
        assert_eq!(SessionId::new("cs_test_1").unwrap().as_str(), "cs_test_1");
    }

    #[test]
    fn session_id_deserialize_validates() {
        let ok: Result<SessionId, _> = serde_json::from_str("\"cs_1\"");
        assert!(ok.is_ok());
        let empty: Result<SessionId, _> = serde_json::from_str("\"\"");
        assert!(empty.is_err());
    }
}
