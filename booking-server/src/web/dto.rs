//! Data transfer objects for web requests and responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    BoxDimensions, ConnectionId, CountryId, InvalidParams, Money, ParcelId, PartySize,
    PurchaseId, SessionId, TicketId,
};
use crate::ledger::PurchaseRecord;
use crate::payment::CallbackToken;
use crate::purchase::PurchaseReceipt;
use crate::search::{MonthRequest, RouteSearchRequest};

/// Query string of `GET /connections/search`.
#[derive(Debug, Deserialize)]
pub struct RouteSearchQuery {
    pub from: CountryId,
    pub to: CountryId,

    /// Travel day in the destination country
    pub date: NaiveDate,

    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub teenagers: u32,

    /// Neighbouring days wanted on each side
    pub range_width: Option<usize>,
}

impl RouteSearchQuery {
    pub fn into_request(self) -> RouteSearchRequest {
        RouteSearchRequest {
            from: self.from,
            to: self.to,
            date: self.date,
            party: PartySize {
                adults: self.adults,
                children: self.children,
                teenagers: self.teenagers,
            },
            range_width: self.range_width,
        }
    }
}

/// Box dimensions in centimetres, as query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DimensionsQuery {
    pub width: u32,
    pub height: u32,
    pub length: u32,
}

impl DimensionsQuery {
    pub fn dimensions(&self) -> BoxDimensions {
        BoxDimensions::new(self.width, self.height, self.length)
    }
}

/// Query string of `GET /parcels/calendar`.
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: CountryId,
    pub to: CountryId,
    pub year: i32,
    pub month: u32,
    pub width: u32,
    pub height: u32,
    pub length: u32,
}

impl CalendarQuery {
    pub fn into_request(self) -> MonthRequest {
        MonthRequest {
            from: self.from,
            to: self.to,
            year: self.year,
            month: self.month,
            dimensions: BoxDimensions::new(self.width, self.height, self.length),
        }
    }
}

/// Response of `GET /parcels/price`.
#[derive(Debug, Serialize)]
pub struct ParcelPriceResponse {
    pub dimensions: BoxDimensions,
    pub price: Money,
}

/// Response to a ticket or parcel purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase: PurchaseId,
    pub connection: ConnectionId,
    pub session_id: SessionId,

    /// Where to send the customer to pay
    pub redirect_url: String,

    pub amount: Money,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<TicketId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parcels: Vec<ParcelId>,
}

impl From<PurchaseReceipt> for PurchaseResponse {
    fn from(receipt: PurchaseReceipt) -> Self {
        Self {
            purchase: receipt.purchase,
            connection: receipt.connection,
            session_id: receipt.session_id,
            redirect_url: receipt.redirect_url,
            amount: receipt.amount,
            tickets: receipt.tickets,
            parcels: receipt.parcels,
        }
    }
}

/// Query string of the payment return URLs.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Missing tokens are rejected as unauthorized, not as malformed
    pub token: Option<CallbackToken>,
}

/// Response of `POST /payments/{session}/succeeded`.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub session_id: SessionId,

    /// False when the purchase had already been confirmed
    pub confirmed: bool,
}

/// Response of `POST /payments/{session}/failed`.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub session_id: SessionId,
    pub purchase: PurchaseId,
    pub released_tickets: usize,
    pub released_parcels: usize,
}

impl CancelResponse {
    pub fn new(session_id: SessionId, record: &PurchaseRecord) -> Self {
        Self {
            session_id,
            purchase: record.id,
            released_tickets: record.tickets.len(),
            released_parcels: record.parcels.len(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Per-field problems for validation errors
    #[serde(skip_serializing_if = "InvalidParams::is_empty")]
    pub fields: InvalidParams,
}
