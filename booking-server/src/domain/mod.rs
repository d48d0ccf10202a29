//! Domain types for the booking service.
//!
//! This module contains the core domain model: buses and their capacity,
//! connections with their lifecycle log, stops, and the purchase records
//! that consume capacity. Types enforce their invariants at construction
//! time, so code that receives them can trust their validity.

mod booking;
mod bus;
mod connection;
mod error;
mod ids;
mod luggage;
mod money;
mod stop;

pub use booking::{
    Address, Contact, Parcel, ParcelKind, ParcelParty, PartySize, Passenger, Ticket,
};
pub use bus::{Bus, CapacityModel, Seat};
pub use connection::{
    Connection, ConnectionLog, ConnectionStatus, ConnectionUpdate, NewConnection, Route,
};
pub use error::{DomainError, InvalidParam, InvalidParams};
pub use ids::{
    AddressId, BusId, ConnectionId, CountryId, InvalidSessionId, ParcelId, PassengerId,
    PurchaseId, SeatId, SessionId, StopId, TicketId,
};
pub use luggage::{
    BoxDimensions, LuggageCategory, LuggageDeclaration, Volume,
    free_allowance_per_unoccupied_seat,
};
pub use money::Money;
pub use stop::{Stop, StopLocation, StopStatus, StopSubject, StopUpdate};
