//! Domain error types.
//!
//! These errors represent validation failures and broken invariants in the
//! domain layer. They are distinct from storage and payment errors.

use std::fmt;

use serde::Serialize;

use super::connection::ConnectionStatus;
use super::ids::SeatId;

/// Domain-level errors for construction and lifecycle invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Arrival must come strictly after departure
    #[error("arrival time must be after departure time")]
    ArrivalBeforeDeparture,

    /// Sales must close no later than departure
    #[error("sell-before must not be after departure time")]
    SellBeforeAfterDeparture,

    /// The status log does not allow this transition
    #[error("connection cannot move from {from} to {to}")]
    InvalidTransition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    /// A bus without any passenger seat cannot run connections
    #[error("bus has no passenger seats")]
    NoSeats,

    /// Every seat on a bus needs its own id
    #[error("seat {0} appears more than once")]
    DuplicateSeat(SeatId),
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

/// Field-level validation failures, collected rather than failing fast so a
/// caller can fix every field in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InvalidParams(Vec<InvalidParam>);

impl InvalidParams {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failing field.
    pub fn push(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.0.push(InvalidParam {
            name: name.into(),
            reason: reason.into(),
        });
    }

    /// A collection with a single failing field.
    pub fn single(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut params = Self::new();
        params.push(name, reason);
        params
    }

    /// Returns `Ok(())` if nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), InvalidParams> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the failing fields.
    pub fn iter(&self) -> impl Iterator<Item = &InvalidParam> {
        self.0.iter()
    }

    /// Whether a field with this name was rejected.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }
}

impl fmt::Display for InvalidParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for param in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", param.name, param.reason)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::ArrivalBeforeDeparture;
        assert_eq!(err.to_string(), "arrival time must be after departure time");

        let err = DomainError::InvalidTransition {
            from: ConnectionStatus::Finished,
            to: ConnectionStatus::Started,
        };
        assert_eq!(err.to_string(), "connection cannot move from Finished to Started");
    }

    #[test]
    fn params_collect_and_display() {
        let mut params = InvalidParams::new();
        assert!(params.clone().into_result().is_ok());

        params.push("width", "must be at least 1");
        params.push("email", "not an e-mail address");
        assert_eq!(params.len(), 2);
        assert!(params.contains("email"));
        assert_eq!(
            params.to_string(),
            "width: must be at least 1; email: not an e-mail address"
        );
        assert!(params.into_result().is_err());
    }
}
