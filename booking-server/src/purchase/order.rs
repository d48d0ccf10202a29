//! Ticket and parcel orders and their validation.
//!
//! Validation collects every field problem at once so the caller can fix
//! the whole form in one go. Capacity is not checked here; that needs the
//! connection lock.

use std::collections::HashSet;

use serde::Deserialize;

use crate::config::BookingConfig;
use crate::domain::{
    Address, AddressId, BoxDimensions, Contact, CountryId, InvalidParams, LuggageDeclaration,
    ParcelKind, ParcelParty, Route, SeatId,
};

/// One passenger in a ticket order.
#[derive(Debug, Clone, Deserialize)]
pub struct PassengerOrder {
    pub first_name: String,
    pub last_name: String,
    pub seat: SeatId,
    #[serde(default)]
    pub luggage: LuggageDeclaration,
}

/// An address as entered by the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub country: CountryId,
    pub city: String,
    pub street: String,
    #[serde(default)]
    pub postal_code: String,
}

impl AddressInput {
    /// A fresh address row for one purchase.
    pub(crate) fn to_address(&self) -> Address {
        Address {
            id: AddressId::new(),
            country: self.country,
            city: self.city.trim().to_string(),
            street: self.street.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        }
    }

    fn validate(&self, field: &str, config: &BookingConfig, errors: &mut InvalidParams) {
        if config.countries.get(&self.country).is_none() {
            errors.push(format!("{field}.country"), "unknown country");
        }
        if self.city.trim().is_empty() {
            errors.push(format!("{field}.city"), "must not be empty");
        }
        if self.street.trim().is_empty() {
            errors.push(format!("{field}.street"), "must not be empty");
        }
    }
}

/// Tickets for one or more passengers on a connection.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketOrder {
    pub passengers: Vec<PassengerOrder>,
    pub pick_up: AddressInput,
    pub drop_off: AddressInput,
    pub contact: Contact,
}

impl TicketOrder {
    pub fn validate(&self, config: &BookingConfig) -> Result<(), InvalidParams> {
        let mut errors = InvalidParams::new();

        if self.passengers.is_empty() {
            errors.push("passengers", "at least one passenger is required");
        }
        let mut seats = HashSet::new();
        for (i, passenger) in self.passengers.iter().enumerate() {
            let field = format!("passengers[{i}]");
            validate_name(&format!("{field}.first_name"), &passenger.first_name, &mut errors);
            validate_name(&format!("{field}.last_name"), &passenger.last_name, &mut errors);
            if !seats.insert(passenger.seat) {
                errors.push(format!("{field}.seat"), "seat requested more than once");
            }
        }

        self.pick_up.validate("pick_up", config, &mut errors);
        self.drop_off.validate("drop_off", config, &mut errors);
        validate_contact("contact", &self.contact, &mut errors);

        errors.into_result()
    }

    /// Number of seats requested.
    pub fn party(&self) -> u32 {
        self.passengers.len() as u32
    }

    /// Addresses must lie at the two ends of `route`.
    pub fn check_route(&self, route: &Route) -> Result<(), InvalidParams> {
        check_route(&self.pick_up, &self.drop_off, route)
    }
}

/// A parcel shipment on a connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ParcelOrder {
    pub kind: ParcelKind,
    pub dimensions: BoxDimensions,
    pub weight_grams: u32,
    pub sender: ParcelParty,
    pub receiver: ParcelParty,
    pub pick_up: AddressInput,
    pub drop_off: AddressInput,
}

impl ParcelOrder {
    pub fn validate(&self, config: &BookingConfig) -> Result<(), InvalidParams> {
        let mut errors = InvalidParams::new();
        let rules = &config.parcel_rules;

        rules.check_dimensions(&self.dimensions, "dimensions.", &mut errors);
        if self.weight_grams < rules.min_weight_grams {
            errors.push(
                "weight_grams",
                format!("must be at least {}", rules.min_weight_grams),
            );
        } else if self.weight_grams > rules.max_weight_grams {
            errors.push(
                "weight_grams",
                format!("must be at most {}", rules.max_weight_grams),
            );
        }

        for (field, party) in [("sender", &self.sender), ("receiver", &self.receiver)] {
            validate_name(&format!("{field}.first_name"), &party.first_name, &mut errors);
            validate_name(&format!("{field}.last_name"), &party.last_name, &mut errors);
            validate_contact(&format!("{field}.contact"), &party.contact, &mut errors);
        }

        self.pick_up.validate("pick_up", config, &mut errors);
        self.drop_off.validate("drop_off", config, &mut errors);

        errors.into_result()
    }

    /// Addresses must lie at the two ends of `route`.
    pub fn check_route(&self, route: &Route) -> Result<(), InvalidParams> {
        check_route(&self.pick_up, &self.drop_off, route)
    }
}

fn check_route(
    pick_up: &AddressInput,
    drop_off: &AddressInput,
    route: &Route,
) -> Result<(), InvalidParams> {
    let mut errors = InvalidParams::new();
    if pick_up.country != route.from {
        errors.push("pick_up.country", "must be the departure country");
    }
    if drop_off.country != route.to {
        errors.push("drop_off.country", "must be the destination country");
    }
    errors.into_result()
}

fn validate_name(field: &str, value: &str, errors: &mut InvalidParams) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, "must not be empty");
    } else if value.chars().count() > 100 {
        errors.push(field, "must be at most 100 characters");
    }
}

fn validate_contact(field: &str, contact: &Contact, errors: &mut InvalidParams) {
    if !is_email(&contact.email) {
        errors.push(format!("{field}.email"), "not a valid e-mail address");
    }
    if !is_phone(&contact.phone) {
        errors.push(format!("{field}.phone"), "not a valid phone number");
    }
}

/// Shape check only: `local@domain.tld` with no whitespace.
fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2 && !tld.ends_with('.'))
}

/// An E.164-style number: optional `+`, then 7 to 15 digits. Spaces and
/// dashes between digits are ignored.
fn is_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let mut count = 0;
    for c in digits.chars() {
        match c {
            '0'..='9' => count += 1,
            ' ' | '-' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&count)
}
