//! Ticket and parcel purchases.
//!
//! A purchase holds capacity on one connection while the customer pays
//! through the configured provider. See [`PurchaseTransaction`] for the
//! full flow.

mod error;
pub(crate) mod order;
mod pricing;
mod transaction;

pub use error::{CapacityConflict, PurchaseError};
pub use order::{AddressInput, ParcelOrder, PassengerOrder, TicketOrder};
pub use pricing::ticket_price;
pub use transaction::{PurchaseReceipt, PurchaseTransaction, RETURN_PATH};
