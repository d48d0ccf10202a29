//! Signed callback tokens.
//!
//! A token is embedded in the provider's return URLs when a checkout session
//! is created. The success and failure callbacks must present it, which
//! binds each callback to the purchase that started the checkout.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::PurchaseId;

use super::error::PaymentError;

/// An opaque, signed callback token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackToken(String);

impl CallbackToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackToken(..)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: PurchaseId,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 callback tokens.
#[derive(Clone)]
pub struct CallbackSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl CallbackSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Sign a token for `purchase`, valid until `now + ttl`.
    pub fn issue(
        &self,
        purchase: PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<CallbackToken, PaymentError> {
        let claims = Claims {
            sub: purchase,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(CallbackToken)
            .map_err(PaymentError::Signing)
    }

    /// Check the signature and expiry, returning the purchase it was issued for.
    ///
    /// Expiry is checked against `now` rather than the system clock.
    pub fn verify(
        &self,
        token: &CallbackToken,
        now: DateTime<Utc>,
    ) -> Result<PurchaseId, PaymentError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<Claims>(&token.0, &self.decoding, &validation)
            .map_err(|_| PaymentError::InvalidToken)?;
        if data.claims.exp <= now.timestamp() {
            return Err(PaymentError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> CallbackSigner {
        CallbackSigner::new(b"0123456789abcdef0123456789abcdef", Duration::minutes(15))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let purchase = PurchaseId::new();
        let token = signer().issue(purchase, now()).unwrap();
        assert_eq!(signer().verify(&token, now()).unwrap(), purchase);
    }

    #[test]
    fn expired_token_rejected() {
        let token = signer().issue(PurchaseId::new(), now()).unwrap();
        let later = now() + Duration::minutes(15);
        assert!(matches!(
            signer().verify(&token, later),
            Err(PaymentError::InvalidToken)
        ));
        assert!(signer().verify(&token, later - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn foreign_signature_rejected() {
        let other = CallbackSigner::new(b"another-secret-of-enough-length!", Duration::minutes(15));
        let token = other.issue(PurchaseId::new(), now()).unwrap();
        assert!(signer().verify(&token, now()).is_err());
    }

    #[test]
    fn garbage_rejected() {
        assert!(signer().verify(&CallbackToken::new("not.a.jwt"), now()).is_err());
    }

    #[test]
    fn debug_hides_token() {
        assert_eq!(format!("{:?}", CallbackToken::new("secret")), "CallbackToken(..)");
    }
}
