//! Reservation ledger: everything sold or held on one connection.
//!
//! The ledger is the source of truth for consumed capacity. Rows enter it
//! only through a purchase and leave it only through the compensating
//! cancel path, one whole purchase at a time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Address, Money, Parcel, ParcelId, Passenger, PurchaseId, SeatId, SessionId, Stop,
    StopStatus, StopSubject, Ticket, TicketId, Volume,
};

/// Payment state of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    /// Capacity is held while the customer pays.
    Pending,
    /// The payment provider reported success.
    Confirmed,
}

/// All rows created by one purchase attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub state: PurchaseState,
    pub session: Option<SessionId>,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
    pub parcels: Vec<Parcel>,
    /// Passenger rows created solely for this purchase.
    pub passengers: Vec<Passenger>,
    /// Address rows created solely for this purchase.
    pub addresses: Vec<Address>,
    pub stops: Vec<Stop>,
}

impl PurchaseRecord {
    /// A pending purchase with one pick-up/drop-off stop pair per item.
    pub fn pending(
        id: PurchaseId,
        tickets: Vec<Ticket>,
        parcels: Vec<Parcel>,
        passengers: Vec<Passenger>,
        addresses: Vec<Address>,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        let subjects = tickets
            .iter()
            .map(|t| StopSubject::Passenger(t.id))
            .chain(parcels.iter().map(|p| StopSubject::Parcel(p.id)));
        let stops = subjects.flat_map(Stop::pair).collect();

        Self {
            id,
            state: PurchaseState::Pending,
            session: None,
            amount,
            created_at,
            tickets,
            parcels,
            passengers,
            addresses,
            stops,
        }
    }

    fn ticket(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|t| &t.id == id)
    }

    fn parcel(&self, id: &ParcelId) -> Option<&Parcel> {
        self.parcels.iter().find(|p| &p.id == id)
    }

    /// Luggage volume of the item a stop refers to.
    fn stop_volume(&self, stop: &Stop) -> Volume {
        match stop.subject {
            StopSubject::Passenger(id) => self.ticket(&id).map_or(Volume::ZERO, |t| t.luggage_volume),
            StopSubject::Parcel(id) => self.parcel(&id).map_or(Volume::ZERO, |p| p.luggage_volume),
        }
    }
}

/// Purchases held or sold on a single connection.
#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    purchases: HashMap<PurchaseId, PurchaseRecord>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct passenger tickets with a pick-up stop on this connection.
    ///
    /// Counts tickets rather than stops, since every ticket has two stops.
    pub fn passengers_boarded(&self) -> u32 {
        let tickets: HashSet<TicketId> = self
            .pick_up_stops()
            .filter_map(|(_, stop)| match stop.subject {
                StopSubject::Passenger(id) => Some(id),
                StopSubject::Parcel(_) => None,
            })
            .collect();
        tickets.len() as u32
    }

    /// Sum of ticket and parcel luggage volumes over pick-up stops.
    pub fn consumed_luggage_volume(&self) -> Volume {
        self.pick_up_stops()
            .map(|(record, stop)| record.stop_volume(stop))
            .sum()
    }

    /// Seats already sold or held.
    pub fn taken_seats(&self) -> HashSet<SeatId> {
        self.purchases
            .values()
            .flat_map(|p| p.tickets.iter().map(|t| t.seat))
            .collect()
    }

    fn pick_up_stops(&self) -> impl Iterator<Item = (&PurchaseRecord, &Stop)> {
        self.purchases
            .values()
            .flat_map(|record| record.stops.iter().map(move |stop| (record, stop)))
            .filter(|(_, stop)| stop.is_pick_up())
    }

    /// Add a purchase. Replaces nothing: purchase ids are fresh UUIDs.
    pub fn insert(&mut self, record: PurchaseRecord) {
        self.purchases.insert(record.id, record);
    }

    pub fn get(&self, id: &PurchaseId) -> Option<&PurchaseRecord> {
        self.purchases.get(id)
    }

    /// Attach the provider's session to a held purchase.
    pub fn bind_session(&mut self, id: &PurchaseId, session: SessionId) -> bool {
        match self.purchases.get_mut(id) {
            Some(record) => {
                record.session = Some(session);
                true
            }
            None => false,
        }
    }

    /// Mark a purchase paid and confirm its stops.
    ///
    /// Returns `None` if the purchase does not exist, `Some(false)` if it was
    /// already confirmed.
    pub fn confirm(&mut self, id: &PurchaseId, at: DateTime<Utc>) -> Option<bool> {
        let record = self.purchases.get_mut(id)?;
        if record.state == PurchaseState::Confirmed {
            return Some(false);
        }
        record.state = PurchaseState::Confirmed;
        for stop in &mut record.stops {
            stop.record(StopStatus::Confirmed, at);
        }
        Some(true)
    }

    /// Remove every row of a purchase at once.
    pub fn remove(&mut self, id: &PurchaseId) -> Option<PurchaseRecord> {
        self.purchases.remove(id)
    }

    pub fn purchases(&self) -> impl Iterator<Item = &PurchaseRecord> {
        self.purchases.values()
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::{BoxDimensions, ConnectionId, LuggageDeclaration};

    fn large() -> LuggageDeclaration {
        LuggageDeclaration {
            large: 1,
            ..Default::default()
        }
    }

    #[test]
    fn empty_ledger_consumes_nothing() {
        let ledger = ReservationLedger::new();
        assert_eq!(ledger.passengers_boarded(), 0);
        assert_eq!(ledger.consumed_luggage_volume(), Volume::ZERO);
        assert!(ledger.taken_seats().is_empty());
    }

    #[test]
    fn each_ticket_counts_once_despite_two_stops() {
        let c = ConnectionId::new();
        let mut ledger = ReservationLedger::new();
        ledger.insert(purchase(
            vec![
                ticket(c, SeatId::new(), LuggageDeclaration::default()),
                ticket(c, SeatId::new(), LuggageDeclaration::default()),
            ],
            vec![],
        ));
        assert_eq!(ledger.passengers_boarded(), 2);
        assert_eq!(ledger.purchases().next().unwrap().stops.len(), 4);
    }

    #[test]
    fn volume_counts_tickets_and_parcels_once() {
        let c = ConnectionId::new();
        let mut ledger = ReservationLedger::new();
        ledger.insert(purchase(vec![ticket(c, SeatId::new(), large())], vec![]));
        ledger.insert(purchase(vec![], vec![parcel(c, BoxDimensions::new(10, 20, 30))]));
        assert_eq!(
            ledger.consumed_luggage_volume(),
            Volume::from_cm3(200_000 + 6_000)
        );
        // Parcels do not occupy seats.
        assert_eq!(ledger.passengers_boarded(), 1);
    }

    #[test]
    fn taken_seats_include_pending() {
        let c = ConnectionId::new();
        let seat = SeatId::new();
        let mut ledger = ReservationLedger::new();
        ledger.insert(purchase(vec![ticket(c, seat, large())], vec![]));
        assert!(ledger.taken_seats().contains(&seat));
    }

    #[test]
    fn confirm_records_stop_status_once() {
        let c = ConnectionId::new();
        let record = purchase(vec![ticket(c, SeatId::new(), large())], vec![]);
        let id = record.id;
        let mut ledger = ReservationLedger::new();
        ledger.insert(record);

        assert_eq!(ledger.confirm(&id, Utc::now()), Some(true));
        assert_eq!(ledger.confirm(&id, Utc::now()), Some(false));
        assert_eq!(ledger.confirm(&PurchaseId::new(), Utc::now()), None);

        let record = ledger.get(&id).unwrap();
        assert_eq!(record.state, PurchaseState::Confirmed);
        assert!(record.stops.iter().all(|s| s.log.len() == 1));
        assert!(record.stops.iter().all(|s| s.status() == Some(StopStatus::Confirmed)));
    }

    #[test]
    fn remove_releases_everything() {
        let c = ConnectionId::new();
        let record = purchase(
            vec![ticket(c, SeatId::new(), large())],
            vec![parcel(c, BoxDimensions::new(10, 10, 10))],
        );
        let id = record.id;
        let mut ledger = ReservationLedger::new();
        ledger.insert(record);
        assert!(ledger.remove(&id).is_some());
        assert!(ledger.is_empty());
        assert_eq!(ledger.passengers_boarded(), 0);
        assert_eq!(ledger.consumed_luggage_volume(), Volume::ZERO);
    }
}
