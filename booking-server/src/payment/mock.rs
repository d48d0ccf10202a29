//! Mock payment gateway for development and testing.
//!
//! Sessions are "created" in memory and every call is recorded, so tests can
//! assert on what the purchase flow asked of the provider. Either call can be
//! switched to fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{Money, SessionId};

use super::error::PaymentError;
use super::token::CallbackToken;
use super::{CheckoutSession, PaymentGateway};

/// A checkout session created through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCheckout {
    pub session_id: SessionId,
    pub amount: Money,
    pub return_path: String,
    pub token: CallbackToken,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MockState {
    checkouts: Vec<MockCheckout>,
    cancelled: Vec<SessionId>,
    fail_checkout: bool,
    fail_cancel: bool,
}

/// In-process gateway that never leaves the machine.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent checkout creations fail.
    pub async fn fail_checkout(&self, fail: bool) {
        self.state.lock().await.fail_checkout = fail;
    }

    /// Make subsequent cancellations fail.
    pub async fn fail_cancel(&self, fail: bool) {
        self.state.lock().await.fail_cancel = fail;
    }

    /// Checkout sessions created so far.
    pub async fn checkouts(&self) -> Vec<MockCheckout> {
        self.state.lock().await.checkouts.clone()
    }

    /// Sessions cancelled so far.
    pub async fn cancelled(&self) -> Vec<SessionId> {
        self.state.lock().await.cancelled.clone()
    }
}

impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        amount: Money,
        return_path: &str,
        token: &CallbackToken,
        expires_at: DateTime<Utc>,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state.lock().await;
        if state.fail_checkout {
            return Err(PaymentError::Declined("mock checkout disabled".to_string()));
        }

        let session_id = SessionId::new(format!("cs_mock_{}", uuid::Uuid::new_v4().simple()))
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        info!(session = %session_id, amount = amount.minor(), "mock checkout session created");

        state.checkouts.push(MockCheckout {
            session_id: session_id.clone(),
            amount,
            return_path: return_path.to_string(),
            token: token.clone(),
            expires_at,
        });

        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.invalid/{}", session_id.as_str()),
            session_id,
        })
    }

    async fn cancel_payment_intent(&self, session: &SessionId) -> Result<(), PaymentError> {
        let mut state = self.state.lock().await;
        if state.fail_cancel {
            return Err(PaymentError::Api {
                status: 502,
                message: "mock cancellation disabled".to_string(),
            });
        }
        info!(session = %session, "mock checkout session expired");
        state.cancelled.push(session.clone());
        Ok(())
    }
}
