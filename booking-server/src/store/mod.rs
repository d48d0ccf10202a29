//! Persistence for buses, connections and their reservation ledgers.
//!
//! The search and purchase components only talk to a [`BookingStore`].
//! The one guarantee they rely on is [`BookingStore::with_connection`]:
//! the closure runs with exclusive access to one connection's ledger, so
//! a capacity check and the insert that depends on it cannot interleave
//! with another purchase on the same connection.

mod error;
mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::availability::Availability;
use crate::domain::{
    Bus, CapacityModel, Connection, ConnectionId, PurchaseId, Route, SessionId,
};
use crate::ledger::ReservationLedger;

pub use error::StoreError;
pub use memory::{FleetFixture, MemoryStore};

#[cfg(test)]
pub(crate) use memory::fixtures as memory_fixtures;

/// A connection together with its capacity, read at one point in time.
///
/// Availability is computed from the ledger at read time and is stale as
/// soon as the lock is released; purchases re-check under the lock.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    pub connection: Connection,
    pub capacity: CapacityModel,
    pub availability: Availability,
}

/// Where a payment session's purchase lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLocator {
    pub connection: ConnectionId,
    pub purchase: PurchaseId,
}

/// Storage used by search and purchase.
///
/// Implementations must serialize [`BookingStore::with_connection`] calls
/// per connection.
pub trait BookingStore: Send + Sync {
    /// Look up one connection with its current availability.
    fn connection(
        &self,
        id: &ConnectionId,
    ) -> impl Future<Output = Result<Option<ConnectionView>, StoreError>> + Send;

    /// Connections on `route` departing in `[from, until)`, ordered by
    /// departure time.
    fn connections_departing(
        &self,
        route: &Route,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ConnectionView>, StoreError>> + Send;

    /// Run `f` with exclusive access to a connection's ledger.
    fn with_connection<F, R>(
        &self,
        id: &ConnectionId,
        f: F,
    ) -> impl Future<Output = Result<R, StoreError>> + Send
    where
        F: FnOnce(&Connection, &Bus, &mut ReservationLedger) -> R + Send,
        R: Send;

    /// Remember which purchase a payment session belongs to.
    fn bind_session(
        &self,
        session: SessionId,
        locator: SessionLocator,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn locate_session(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionLocator>, StoreError>> + Send;

    fn forget_session(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_bus(&self, bus: Bus) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Add a connection. Its bus must already be stored.
    fn insert_connection(
        &self,
        connection: Connection,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
