//! In-memory booking store.
//!
//! Each connection lives behind its own `tokio::sync::Mutex` together with
//! its bus and ledger. The maps holding those entries are only locked long
//! enough to clone an `Arc`, so purchases on different connections never
//! wait for each other.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::availability::availability;
use crate::domain::{Bus, BusId, Connection, ConnectionId, NewConnection, Route, SessionId};
use crate::ledger::ReservationLedger;

use super::error::StoreError;
use super::{BookingStore, ConnectionView, SessionLocator};

/// Fleet data loaded at startup: buses and the connections they run.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetFixture {
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub connections: Vec<NewConnection>,
}

impl FleetFixture {
    /// Read a fixture from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::FixtureIo {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&json)?)
    }
}

struct ConnectionEntry {
    connection: Connection,
    bus: Arc<Bus>,
    ledger: ReservationLedger,
}

impl ConnectionEntry {
    fn view(&self) -> ConnectionView {
        let capacity = self.bus.capacity();
        ConnectionView {
            availability: availability(&self.connection.id, &capacity, &self.ledger),
            connection: self.connection.clone(),
            capacity,
        }
    }
}

#[derive(Default)]
struct Inner {
    buses: RwLock<HashMap<BusId, Arc<Bus>>>,
    connections: RwLock<HashMap<ConnectionId, Arc<Mutex<ConnectionEntry>>>>,
    /// Departure index: route -> (departure time, id).
    departures: RwLock<HashMap<Route, BTreeSet<(DateTime<Utc>, ConnectionId)>>>,
    sessions: RwLock<HashMap<SessionId, SessionLocator>>,
}

/// Thread-safe in-memory [`BookingStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from fleet data, registering every connection at `now`.
    pub async fn from_fixture(
        fixture: FleetFixture,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for bus in fixture.buses {
            // Re-run construction so fixture buses get the same checks.
            let bus = Bus::new(bus.id, bus.model, bus.registration, bus.seats, bus.luggage_volume)?;
            store.insert_bus(bus).await?;
        }
        for input in fixture.connections {
            store.insert_connection(Connection::new(input, now)?).await?;
        }
        Ok(store)
    }

    /// Load fleet data from a JSON file.
    pub async fn load(path: impl AsRef<Path>, now: DateTime<Utc>) -> Result<Self, StoreError> {
        Self::from_fixture(FleetFixture::from_file(path).await?, now).await
    }

    /// Number of stored connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    async fn entry(&self, id: &ConnectionId) -> Option<Arc<Mutex<ConnectionEntry>>> {
        self.inner.connections.read().await.get(id).cloned()
    }
}

impl BookingStore for MemoryStore {
    async fn connection(&self, id: &ConnectionId) -> Result<Option<ConnectionView>, StoreError> {
        let Some(entry) = self.entry(id).await else {
            return Ok(None);
        };
        let guard = entry.lock().await;
        Ok(Some(guard.view()))
    }

    async fn connections_departing(
        &self,
        route: &Route,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ConnectionView>, StoreError> {
        if from >= until {
            return Ok(Vec::new());
        }

        let ids: Vec<ConnectionId> = {
            let departures = self.inner.departures.read().await;
            match departures.get(route) {
                Some(index) => index
                    .range((from, ConnectionId::from_uuid(uuid::Uuid::nil()))..)
                    .take_while(|(departure, _)| *departure < until)
                    .map(|(_, id)| *id)
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.entry(&id).await {
                views.push(entry.lock().await.view());
            }
        }
        Ok(views)
    }

    async fn with_connection<F, R>(&self, id: &ConnectionId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection, &Bus, &mut ReservationLedger) -> R + Send,
        R: Send,
    {
        let entry = self
            .entry(id)
            .await
            .ok_or(StoreError::ConnectionNotFound(*id))?;
        let mut guard = entry.lock().await;
        let ConnectionEntry {
            connection,
            bus,
            ledger,
        } = &mut *guard;
        Ok(f(connection, &**bus, ledger))
    }

    async fn bind_session(
        &self,
        session: SessionId,
        locator: SessionLocator,
    ) -> Result<(), StoreError> {
        self.inner.sessions.write().await.insert(session, locator);
        Ok(())
    }

    async fn locate_session(
        &self,
        session: &SessionId,
    ) -> Result<Option<SessionLocator>, StoreError> {
        Ok(self.inner.sessions.read().await.get(session).copied())
    }

    async fn forget_session(&self, session: &SessionId) -> Result<(), StoreError> {
        self.inner.sessions.write().await.remove(session);
        Ok(())
    }

    async fn insert_bus(&self, bus: Bus) -> Result<(), StoreError> {
        let mut buses = self.inner.buses.write().await;
        if buses.contains_key(&bus.id) {
            return Err(StoreError::Duplicate {
                kind: "bus",
                id: bus.id.to_string(),
            });
        }
        buses.insert(bus.id, Arc::new(bus));
        Ok(())
    }

    async fn insert_connection(&self, connection: Connection) -> Result<(), StoreError> {
        let bus = self
            .inner
            .buses
            .read()
            .await
            .get(&connection.bus_id)
            .cloned()
            .ok_or(StoreError::BusNotFound(connection.bus_id))?;

        let mut connections = self.inner.connections.write().await;
        if connections.contains_key(&connection.id) {
            return Err(StoreError::Duplicate {
                kind: "connection",
                id: connection.id.to_string(),
            });
        }

        self.inner
            .departures
            .write()
            .await
            .entry(connection.route)
            .or_default()
            .insert((connection.departure_time, connection.id));

        connections.insert(
            connection.id,
            Arc::new(Mutex::new(ConnectionEntry {
                connection,
                bus,
                ledger: ReservationLedger::new(),
            })),
        );
        Ok(())
    }
}
