//! Bus booking server.
//!
//! Sells seats and parcel space on scheduled international bus
//! connections: availability search, a monthly parcel calendar, parcel
//! pricing, and a purchase flow that holds capacity while the customer
//! pays through a hosted checkout.

pub mod availability;
pub mod config;
pub mod domain;
pub mod ledger;
pub mod payment;
pub mod purchase;
pub mod search;
pub mod store;
pub mod tariff;
pub mod web;
