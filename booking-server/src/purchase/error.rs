//! Purchase error types.

use crate::domain::{ConnectionId, ConnectionStatus, InvalidParams, SeatId, Volume};
use crate::payment::PaymentError;
use crate::store::StoreError;

/// Why the requested items do not fit on the connection.
///
/// Never retried automatically; the caller has to look at availability
/// again and choose differently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityConflict {
    #[error("{requested} seats requested but only {left} left")]
    NotEnoughSeats { requested: u32, left: u32 },

    #[error("seat {0} is already taken")]
    SeatTaken(SeatId),

    #[error("seat {0} is not a passenger seat on this bus")]
    UnknownSeat(SeatId),

    #[error("{requested} of luggage requested but only {left} left")]
    NotEnoughVolume { requested: Volume, left: Volume },
}

/// Errors from the purchase flow.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    /// The order is malformed
    #[error("invalid order: {0}")]
    Validation(InvalidParams),

    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The connection's status does not allow sales
    #[error("connection is {0} and not open for sale")]
    SaleClosed(ConnectionStatus),

    /// The sale cutoff has passed
    #[error("sales for this connection have ended")]
    ExpiredSale,

    #[error("capacity conflict: {0}")]
    CapacityConflict(#[from] CapacityConflict),

    /// The payment provider failed; nothing stays reserved
    #[error("payment provider failed: {0}")]
    PaymentGateway(#[source] PaymentError),

    /// The callback token is missing, invalid, expired or for another purchase
    #[error("callback is not authorized")]
    Unauthorized,

    /// No held purchase belongs to this payment session
    #[error("unknown payment session")]
    UnknownSession,

    /// A paid purchase cannot be cancelled through the payment callback
    #[error("purchase is already paid")]
    AlreadyConfirmed,

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<InvalidParams> for PurchaseError {
    fn from(params: InvalidParams) -> Self {
        PurchaseError::Validation(params)
    }
}

impl From<StoreError> for PurchaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionNotFound(id) => PurchaseError::ConnectionNotFound(id),
            other => PurchaseError::Storage(other),
        }
    }
}
