//! Payment provider integration.
//!
//! The purchase flow reserves capacity first and only then asks the
//! provider for a hosted checkout session. The provider later calls back
//! with success or failure; each callback carries a [`CallbackToken`]
//! issued when the session was created.

mod error;
mod mock;
mod stripe;
mod token;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{Money, SessionId};

pub use error::PaymentError;
pub use mock::{MockCheckout, MockGateway};
pub use stripe::{StripeConfig, StripeGateway};
pub use token::{CallbackSigner, CallbackToken};

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Where to send the customer to pay.
    pub redirect_url: String,
    pub session_id: SessionId,
}

/// A hosted-checkout payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session for `amount` that can be paid until
    /// `expires_at`.
    ///
    /// Return URLs are built from `return_path` and carry `token`.
    fn create_checkout_session(
        &self,
        amount: Money,
        return_path: &str,
        token: &CallbackToken,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<CheckoutSession, PaymentError>> + Send;

    /// Expire a session so it can no longer be paid.
    fn cancel_payment_intent(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<(), PaymentError>> + Send;
}

/// The gateway selected at startup.
#[derive(Debug, Clone)]
pub enum PaymentBackend {
    Stripe(StripeGateway),
    Mock(MockGateway),
}

impl PaymentBackend {
    pub fn name(&self) -> &'static str {
        match self {
            PaymentBackend::Stripe(_) => "stripe",
            PaymentBackend::Mock(_) => "mock",
        }
    }
}

impl PaymentGateway for PaymentBackend {
    async fn create_checkout_session(
        &self,
        amount: Money,
        return_path: &str,
        token: &CallbackToken,
        expires_at: DateTime<Utc>,
    ) -> Result<CheckoutSession, PaymentError> {
        match self {
            PaymentBackend::Stripe(g) => {
                g.create_checkout_session(amount, return_path, token, expires_at)
                    .await
            }
            PaymentBackend::Mock(g) => {
                g.create_checkout_session(amount, return_path, token, expires_at)
                    .await
            }
        }
    }

    async fn cancel_payment_intent(&self, session: &SessionId) -> Result<(), PaymentError> {
        match self {
            PaymentBackend::Stripe(g) => g.cancel_payment_intent(session).await,
            PaymentBackend::Mock(g) => g.cancel_payment_intent(session).await,
        }
    }
}
