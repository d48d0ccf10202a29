//! Remaining capacity of a connection.
//!
//! Availability is always derived from the bus capacity and the ledger; it is
//! never cached, because every purchase changes it.

use serde::Serialize;
use tracing::error;

use crate::domain::{CapacityModel, ConnectionId, Volume, free_allowance_per_unoccupied_seat};
use crate::ledger::ReservationLedger;

/// Seats and luggage volume still available on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub seats_left: u32,
    pub luggage_volume_left: Volume,
    pub passengers_boarded: u32,
    /// The ledger exceeds capacity and the numbers above were clamped to zero.
    pub overbooked: bool,
}

impl Availability {
    /// Compute availability without side effects.
    ///
    /// `luggage_volume_left` subtracts the free allowance of every unsold
    /// seat (see [`free_allowance_per_unoccupied_seat`]), so it can go below
    /// zero even without overselling; that case is clamped and flagged too.
    pub fn compute(capacity: &CapacityModel, ledger: &ReservationLedger) -> Self {
        let boarded = ledger.passengers_boarded();
        let raw_seats = i64::from(capacity.seat_count) - i64::from(boarded);

        let unoccupied = raw_seats.max(0);
        let reserved_allowance =
            i128::from(unoccupied) * i128::from(free_allowance_per_unoccupied_seat().cm3());
        let raw_volume = i128::from(capacity.luggage_volume.cm3())
            - i128::from(ledger.consumed_luggage_volume().cm3())
            - reserved_allowance;

        Self {
            seats_left: u32::try_from(raw_seats.max(0)).unwrap_or(u32::MAX),
            luggage_volume_left: Volume::from_cm3(u64::try_from(raw_volume.max(0)).unwrap_or(u64::MAX)),
            passengers_boarded: boarded,
            overbooked: raw_seats < 0 || raw_volume < 0,
        }
    }

    /// Whether `party` more passengers fit.
    pub fn fits_party(&self, party: u32) -> bool {
        party <= self.seats_left
    }

    /// Whether `volume` more luggage fits.
    pub fn fits_volume(&self, volume: Volume) -> bool {
        volume <= self.luggage_volume_left
    }
}

/// Availability of one connection, raising an operational alarm when clamped.
pub fn availability(
    connection: &ConnectionId,
    capacity: &CapacityModel,
    ledger: &ReservationLedger,
) -> Availability {
    let result = Availability::compute(capacity, ledger);
    if result.overbooked {
        error!(
            target: "capacity_alarm",
            connection = %connection,
            seat_count = capacity.seat_count,
            passengers_boarded = result.passengers_boarded,
            luggage_capacity = capacity.luggage_volume.cm3(),
            luggage_consumed = ledger.consumed_luggage_volume().cm3(),
            "connection capacity exceeded; availability clamped to zero"
        );
    }
    result
}
