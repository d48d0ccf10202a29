//! Purchase records: tickets, parcels and the rows they own.

use serde::{Deserialize, Serialize};

use super::ids::{AddressId, ConnectionId, CountryId, ParcelId, PassengerId, SeatId, TicketId};
use super::luggage::{BoxDimensions, LuggageDeclaration, Volume};
use super::money::Money;

/// Number of travellers in each fare group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySize {
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub teenagers: u32,
}

impl PartySize {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.teenagers
    }
}

/// Contact details attached to a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub country: CountryId,
    pub city: String,
    pub street: String,
    #[serde(default)]
    pub postal_code: String,
}

/// A passenger ticket for one seat on one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub connection: ConnectionId,
    pub seat: SeatId,
    pub passenger: PassengerId,
    pub pick_up: AddressId,
    pub drop_off: AddressId,
    pub contact: Contact,
    pub luggage: LuggageDeclaration,
    /// Derived from `luggage` at purchase time.
    pub luggage_volume: Volume,
    /// Price snapshot at purchase time.
    pub price: Money,
}

/// Recorded for audit only; pricing depends on dimensions alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelKind {
    Documents,
    Package,
}

/// A person on either end of a parcel shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelParty {
    pub first_name: String,
    pub last_name: String,
    pub contact: Contact,
}

/// A parcel travelling in the luggage compartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub connection: ConnectionId,
    pub kind: ParcelKind,
    pub dimensions: BoxDimensions,
    pub weight_grams: u32,
    pub sender: ParcelParty,
    pub receiver: ParcelParty,
    pub pick_up: AddressId,
    pub drop_off: AddressId,
    /// Bounding-box volume of the parcel.
    pub luggage_volume: Volume,
    /// Price snapshot at purchase time.
    pub price: Money,
}
