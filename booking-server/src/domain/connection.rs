//! Scheduled connections and their lifecycle log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::ids::{BusId, ConnectionId, CountryId};
use super::money::Money;

/// An ordered (departure country, destination country) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub from: CountryId,
    pub to: CountryId,
}

impl Route {
    pub const fn new(from: CountryId, to: CountryId) -> Self {
        Self { from, to }
    }
}

/// Lifecycle status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Registered,
    DepartureTimeChanged,
    Canceled,
    Started,
    Finished,
    Stopped,
    Renewed,
    CouldNotBeFinished,
}

impl ConnectionStatus {
    /// Whether `next` may be appended after `self`.
    pub fn can_be_followed_by(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        match self {
            Registered | DepartureTimeChanged | Renewed => {
                matches!(next, Canceled | DepartureTimeChanged | Started)
            }
            Canceled => matches!(next, Renewed),
            Started => matches!(next, Stopped | Finished | CouldNotBeFinished),
            Stopped => matches!(next, Started | CouldNotBeFinished),
            Finished | CouldNotBeFinished => false,
        }
    }

    /// Whether new tickets and parcels may be sold in this status.
    pub fn is_open_for_sale(self) -> bool {
        use ConnectionStatus::*;
        match self {
            Registered | DepartureTimeChanged | Renewed => true,
            Canceled | Started | Finished | Stopped | CouldNotBeFinished => false,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Registered => "Registered",
            ConnectionStatus::DepartureTimeChanged => "Departure Time Changed",
            ConnectionStatus::Canceled => "Canceled",
            ConnectionStatus::Started => "Started",
            ConnectionStatus::Finished => "Finished",
            ConnectionStatus::Stopped => "Stopped",
            ConnectionStatus::Renewed => "Renewed",
            ConnectionStatus::CouldNotBeFinished => "Could Not Be Finished",
        };
        f.write_str(name)
    }
}

/// One entry of the append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub status: ConnectionStatus,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

/// Append-only status history. Never empty: it starts with `Registered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionLog(Vec<ConnectionUpdate>);

impl ConnectionLog {
    /// A fresh log containing only the registration.
    pub fn registered(at: DateTime<Utc>) -> Self {
        Self(vec![ConnectionUpdate {
            status: ConnectionStatus::Registered,
            at,
            comment: String::new(),
        }])
    }

    /// The most recent status.
    pub fn current(&self) -> ConnectionStatus {
        // Invariant: constructed non-empty and only ever appended to.
        self.0
            .last()
            .map_or(ConnectionStatus::Registered, |u| u.status)
    }

    /// Append a status after checking the transition.
    pub fn append(&mut self, update: ConnectionUpdate) -> Result<(), DomainError> {
        let from = self.current();
        if !from.can_be_followed_by(update.status) {
            return Err(DomainError::InvalidTransition {
                from,
                to: update.status,
            });
        }
        self.0.push(update);
        Ok(())
    }

    pub fn entries(&self) -> &[ConnectionUpdate] {
        &self.0
    }
}

/// A scheduled trip of one bus between two countries.
///
/// All instants are stored in UTC; local display times are derived from the
/// country time zones when needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub line: u16,
    pub bus_id: BusId,
    pub route: Route,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Base fare per passenger.
    pub price: Money,
    /// No purchase is accepted at or after this instant.
    pub sell_before: DateTime<Utc>,
    pub log: ConnectionLog,
}

/// Input for [`Connection::new`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewConnection {
    #[serde(default = "ConnectionId::new")]
    pub id: ConnectionId,
    #[serde(default)]
    pub line: u16,
    pub bus_id: BusId,
    pub route: Route,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Money,
    pub sell_before: DateTime<Utc>,
}

impl Connection {
    /// Validate and register a new connection.
    pub fn new(input: NewConnection, registered_at: DateTime<Utc>) -> Result<Self, DomainError> {
        check_times(input.departure_time, input.arrival_time, input.sell_before)?;
        Ok(Self {
            id: input.id,
            line: input.line,
            bus_id: input.bus_id,
            route: input.route,
            departure_time: input.departure_time,
            arrival_time: input.arrival_time,
            price: input.price,
            sell_before: input.sell_before,
            log: ConnectionLog::registered(registered_at),
        })
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConnectionStatus {
        self.log.current()
    }

    /// Whether a purchase made at `now` would still be before the sales cutoff.
    pub fn is_on_sale_at(&self, now: DateTime<Utc>) -> bool {
        now < self.sell_before
    }

    /// Append a status update.
    pub fn record(&mut self, update: ConnectionUpdate) -> Result<(), DomainError> {
        self.log.append(update)
    }

    /// Move the connection to new times, logging `DepartureTimeChanged`.
    pub fn reschedule(
        &mut self,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        sell_before: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        check_times(departure_time, arrival_time, sell_before)?;
        self.log.append(ConnectionUpdate {
            status: ConnectionStatus::DepartureTimeChanged,
            at,
            comment: String::new(),
        })?;
        self.departure_time = departure_time;
        self.arrival_time = arrival_time;
        self.sell_before = sell_before;
        Ok(())
    }

    /// Scheduled travel time.
    pub fn duration(&self) -> chrono::Duration {
        self.arrival_time - self.departure_time
    }
}

fn check_times(
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
    sell_before: DateTime<Utc>,
) -> Result<(), DomainError> {
    if arrival <= departure {
        return Err(DomainError::ArrivalBeforeDeparture);
    }
    if sell_before > departure {
        return Err(DomainError::SellBeforeAfterDeparture);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, h, 0, 0).unwrap()
    }

    fn input() -> NewConnection {
        NewConnection {
            id: ConnectionId::new(),
            line: 7,
            bus_id: BusId::new(),
            route: Route::new(CountryId::new(), CountryId::new()),
            departure_time: at(10),
            arrival_time: at(20),
            price: Money::from_minor(4500),
            sell_before: at(10) - Duration::hours(24),
        }
    }

    fn update(status: ConnectionStatus) -> ConnectionUpdate {
        ConnectionUpdate {
            status,
            at: at(1),
            comment: String::new(),
        }
    }

    #[test]
    fn new_connection_starts_registered() {
        let c = Connection::new(input(), at(0)).unwrap();
        assert_eq!(c.status(), ConnectionStatus::Registered);
        assert_eq!(c.log.entries().len(), 1);
        assert_eq!(c.duration(), Duration::hours(10));
    }

    #[test]
    fn arrival_must_follow_departure() {
        let mut bad = input();
        bad.arrival_time = bad.departure_time;
        assert_eq!(
            Connection::new(bad, at(0)).unwrap_err(),
            DomainError::ArrivalBeforeDeparture
        );
    }

    #[test]
    fn sell_before_must_not_follow_departure() {
        let mut bad = input();
        bad.sell_before = bad.departure_time + Duration::minutes(1);
        assert_eq!(
            Connection::new(bad, at(0)).unwrap_err(),
            DomainError::SellBeforeAfterDeparture
        );
    }

    #[test]
    fn sale_cutoff_is_exclusive() {
        let c = Connection::new(input(), at(0)).unwrap();
        assert!(c.is_on_sale_at(c.sell_before - Duration::seconds(1)));
        assert!(!c.is_on_sale_at(c.sell_before));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut c = Connection::new(input(), at(0)).unwrap();
        c.record(update(ConnectionStatus::Started)).unwrap();
        c.record(update(ConnectionStatus::Stopped)).unwrap();
        c.record(update(ConnectionStatus::Started)).unwrap();
        c.record(update(ConnectionStatus::Finished)).unwrap();
        assert_eq!(c.status(), ConnectionStatus::Finished);
        assert_eq!(c.log.entries().len(), 5);
    }

    #[test]
    fn finished_is_terminal() {
        let mut c = Connection::new(input(), at(0)).unwrap();
        c.record(update(ConnectionStatus::Started)).unwrap();
        c.record(update(ConnectionStatus::Finished)).unwrap();
        let err = c.record(update(ConnectionStatus::Started)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(c.log.entries().len(), 3);
    }

    #[test]
    fn canceled_can_only_be_renewed() {
        let mut c = Connection::new(input(), at(0)).unwrap();
        c.record(update(ConnectionStatus::Canceled)).unwrap();
        assert!(!c.status().is_open_for_sale());
        assert!(c.record(update(ConnectionStatus::Started)).is_err());
        c.record(update(ConnectionStatus::Renewed)).unwrap();
        assert!(c.status().is_open_for_sale());
    }

    #[test]
    fn reschedule_moves_times_and_logs() {
        let mut c = Connection::new(input(), at(0)).unwrap();
        let shift = Duration::hours(2);
        c.reschedule(
            c.departure_time + shift,
            c.arrival_time + shift,
            c.sell_before + shift,
            at(2),
        )
        .unwrap();
        assert_eq!(c.departure_time, at(12));
        assert_eq!(c.status(), ConnectionStatus::DepartureTimeChanged);
    }

    #[test]
    fn reschedule_validates_before_logging() {
        let mut c = Connection::new(input(), at(0)).unwrap();
        let err = c
            .reschedule(at(12), at(11), at(1), at(2))
            .unwrap_err();
        assert_eq!(err, DomainError::ArrivalBeforeDeparture);
        assert_eq!(c.status(), ConnectionStatus::Registered);
    }
}
