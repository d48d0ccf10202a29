//! Buses and their static capacity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::ids::{BusId, SeatId};
use super::luggage::Volume;

/// A physical seat. Number 0 is the crew seat and is never sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub number: u16,
}

impl Seat {
    /// Whether this seat can be sold to a passenger.
    pub fn is_passenger_seat(&self) -> bool {
        self.number != 0
    }
}

/// A bus in service.
///
/// Capacity facts are fixed while the bus is in service; fleet changes go
/// through separate workflows and simply produce a new `Bus` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub model: String,
    pub registration: String,
    pub seats: Vec<Seat>,
    /// Luggage compartment capacity.
    pub luggage_volume: Volume,
}

impl Bus {
    /// Build a bus, requiring at least one passenger seat and distinct seat ids.
    pub fn new(
        id: BusId,
        model: impl Into<String>,
        registration: impl Into<String>,
        seats: Vec<Seat>,
        luggage_volume: Volume,
    ) -> Result<Self, DomainError> {
        if !seats.iter().any(Seat::is_passenger_seat) {
            return Err(DomainError::NoSeats);
        }
        let mut ids = HashSet::with_capacity(seats.len());
        if let Some(seat) = seats.iter().find(|s| !ids.insert(s.id)) {
            return Err(DomainError::DuplicateSeat(seat.id));
        }
        Ok(Self {
            id,
            model: model.into(),
            registration: registration.into(),
            seats,
            luggage_volume,
        })
    }

    /// The static capacity of this bus.
    pub fn capacity(&self) -> CapacityModel {
        CapacityModel {
            seat_count: self.seats.iter().filter(|s| s.is_passenger_seat()).count() as u32,
            luggage_volume: self.luggage_volume,
        }
    }

    /// Whether `seat` is a sellable seat on this bus.
    pub fn has_passenger_seat(&self, seat: &SeatId) -> bool {
        self.seats
            .iter()
            .any(|s| &s.id == seat && s.is_passenger_seat())
    }
}

/// Seat count and luggage-compartment volume of one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityModel {
    pub seat_count: u32,
    pub luggage_volume: Volume,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(numbers: &[u16]) -> Vec<Seat> {
        numbers
            .iter()
            .map(|&number| Seat {
                id: SeatId::new(),
                number,
            })
            .collect()
    }

    #[test]
    fn crew_seat_is_not_counted() {
        let bus = Bus::new(
            BusId::new(),
            "Sprinter",
            "AB 1234",
            seats(&[0, 1, 2, 3]),
            Volume::from_cm3(500_000),
        )
        .unwrap();
        let capacity = bus.capacity();
        assert_eq!(capacity.seat_count, 3);
        assert_eq!(capacity.luggage_volume, Volume::from_cm3(500_000));
    }

    #[test]
    fn crew_seat_is_not_sellable() {
        let all = seats(&[0, 1]);
        let crew = all[0].id;
        let passenger = all[1].id;
        let bus = Bus::new(BusId::new(), "Sprinter", "AB 1234", all, Volume::ZERO).unwrap();
        assert!(!bus.has_passenger_seat(&crew));
        assert!(bus.has_passenger_seat(&passenger));
        assert!(!bus.has_passenger_seat(&SeatId::new()));
    }

    #[test]
    fn bus_without_passenger_seats_is_rejected() {
        let err = Bus::new(BusId::new(), "Van", "X", seats(&[0]), Volume::ZERO).unwrap_err();
        assert_eq!(err, DomainError::NoSeats);
    }

    #[test]
    fn repeated_seat_id_is_rejected() {
        let mut all = seats(&[0, 1, 2]);
        all[2].id = all[1].id;
        let repeated = all[1].id;
        let err = Bus::new(BusId::new(), "Sprinter", "AB 1234", all, Volume::ZERO).unwrap_err();
        assert_eq!(err, DomainError::DuplicateSeat(repeated));
    }
}
