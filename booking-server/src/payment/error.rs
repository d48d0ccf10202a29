//! Payment error types.

/// Errors from the payment provider or from callback verification.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error status
    #[error("payment provider error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider rejected our credentials
    #[error("unauthorized (invalid payment provider key)")]
    Unauthorized,

    /// The provider answered with something we could not read
    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),

    /// The provider declined the operation
    #[error("payment declined: {0}")]
    Declined(String),

    /// A callback token could not be signed
    #[error("failed to sign callback token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// A callback token is malformed, badly signed or expired
    #[error("invalid callback token")]
    InvalidToken,
}

impl PaymentError {
    /// Whether the error means the caller is not allowed to act, as opposed
    /// to the provider failing.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PaymentError::InvalidToken)
    }
}
