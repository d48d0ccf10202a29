//! Stripe checkout client.
//!
//! Talks to the Stripe REST API directly with form-encoded requests. Only
//! the two calls the booking flow needs are implemented: creating a hosted
//! checkout session and expiring it when a purchase is abandoned.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{Money, SessionId};

use super::error::PaymentError;
use super::token::CallbackToken;
use super::{CheckoutSession, PaymentGateway};

/// Default base URL for the Stripe API.
const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Placeholder Stripe substitutes with the session id in return URLs.
const SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Configuration for the Stripe client.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: String,
    /// Base URL for the API (defaults to production Stripe)
    pub base_url: String,
    /// Public base URL of this service, used to build return URLs
    pub return_base: String,
    /// ISO currency code for line items
    pub currency: String,
    /// Product name shown on the checkout page
    pub product_name: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl StripeConfig {
    /// Create a new config with the given secret key and return base URL.
    pub fn new(secret_key: impl Into<String>, return_base: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            return_base: return_base.into(),
            currency: "eur".to_string(),
            product_name: "Ticket".to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    /// Create a new Stripe client with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// Return URL for one callback outcome.
    fn return_url(&self, return_path: &str, outcome: &str, token: &CallbackToken) -> String {
        format!(
            "{}{}/{}/{}?token={}",
            self.config.return_base.trim_end_matches('/'),
            return_path,
            SESSION_PLACEHOLDER,
            outcome,
            token.as_str()
        )
    }

    fn checkout_form(
        &self,
        amount: Money,
        return_path: &str,
        token: &CallbackToken,
        expires_at: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("expires_at", expires_at.timestamp().to_string()),
            ("success_url", self.return_url(return_path, "succeeded", token)),
            ("cancel_url", self.return_url(return_path, "failed", token)),
            (
                "line_items[0][price_data][currency]",
                self.config.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.config.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount.minor().to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
        ]
    }

    async fn post(
        &self,
        path: &str,
        form: &[(&'static str, String)],
    ) -> Result<SessionResponse, PaymentError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(url = %url, "Stripe request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PaymentError::Unauthorized);
        }

        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), message = %message, "Stripe rejected request");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        amount: Money,
        return_path: &str,
        token: &CallbackToken,
        expires_at: DateTime<Utc>,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = self.checkout_form(amount, return_path, token, expires_at);
        let session = self.post("/v1/checkout/sessions", &form).await?;

        let redirect_url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("session has no url".to_string()))?;
        let session_id = SessionId::new(session.id)
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(CheckoutSession {
            redirect_url,
            session_id,
        })
    }

    async fn cancel_payment_intent(&self, session: &SessionId) -> Result<(), PaymentError> {
        let path = format!("/v1/checkout/sessions/{}/expire", session.as_str());
        self.post(&path, &[]).await?;
        Ok(())
    }
}
