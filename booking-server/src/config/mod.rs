//! Service configuration.
//!
//! Static reference data (countries, luggage prices, the parcel tariff) is
//! loaded from a JSON file into an immutable [`BookingConfig`]. Components
//! receive it explicitly through a [`ConfigHandle`], which can rebuild it
//! from disk and swap it in without restarting the service.

mod countries;
mod error;

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::{BoxDimensions, InvalidParams, Money};
use crate::search::SearchConfig;
use crate::tariff::{ParcelTariff, TariffTier};

pub use countries::{Country, CountryDirectory, CountryEntry};
pub use error::ConfigError;

/// Prices charged for luggage beyond the free per-seat allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LuggagePrices {
    pub backpack: Money,
    pub small: Money,
    pub large: Money,
}

/// Limits applied to parcel orders before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ParcelRules {
    /// Smallest accepted dimensions, compared per axis as given.
    pub min_dimensions: BoxDimensions,
    pub min_weight_grams: u32,
    pub max_weight_grams: u32,
}

impl ParcelRules {
    /// Report every axis that is zero or below the minimum as `{prefix}{axis}`.
    pub fn check_dimensions(
        &self,
        dimensions: &BoxDimensions,
        prefix: &str,
        errors: &mut InvalidParams,
    ) {
        let min = self.min_dimensions;
        for (axis, value, floor) in [
            ("width", dimensions.width, min.width),
            ("height", dimensions.height, min.height),
            ("length", dimensions.length, min.length),
        ] {
            let floor = floor.max(1);
            if value < floor {
                errors.push(format!("{prefix}{axis}"), format!("must be at least {floor}"));
            }
        }
    }
}

impl Default for ParcelRules {
    fn default() -> Self {
        Self {
            min_dimensions: BoxDimensions::new(1, 1, 1),
            min_weight_grams: 1,
            max_weight_grams: 30_000,
        }
    }
}

/// Settings for payment callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentSettings {
    /// HMAC secret used to sign callback tokens.
    pub callback_secret: String,
    /// Base URL the provider redirects the customer back to.
    pub return_base: String,
    /// Lifetime of a checkout session, in minutes.
    #[serde(default = "default_session_ttl_mins")]
    pub session_ttl_mins: i64,
}

/// Stripe accepts session expiries between 30 minutes and 24 hours out.
pub const SESSION_TTL_MINS: RangeInclusive<i64> = 30..=24 * 60;

/// How long after session expiry a callback is still accepted.
///
/// The provider reports an abandoned session when it expires, so the
/// failure callback always arrives after the session is gone.
pub const CALLBACK_GRACE_MINS: i64 = 60;

fn default_session_ttl_mins() -> i64 {
    *SESSION_TTL_MINS.start()
}

impl PaymentSettings {
    /// How long the customer has to pay.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_mins)
    }

    /// Lifetime of a callback token: the session plus the grace period.
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_mins + CALLBACK_GRACE_MINS)
    }
}

#[derive(Debug, Deserialize)]
struct TariffFile {
    tiers: Vec<TariffTier>,
    oversize_price: Money,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    countries: Vec<CountryEntry>,
    luggage_prices: LuggagePrices,
    parcel_tariff: TariffFile,
    #[serde(default)]
    parcel_rules: ParcelRules,
    #[serde(default)]
    search: SearchConfig,
    payment: PaymentSettings,
}

/// Validated configuration snapshot.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub countries: CountryDirectory,
    pub luggage_prices: LuggagePrices,
    pub tariff: ParcelTariff,
    pub parcel_rules: ParcelRules,
    pub search: SearchConfig,
    pub payment: PaymentSettings,
}

impl BookingConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Self::try_from(file)
    }

    /// Read, parse and validate a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }
}

impl TryFrom<ConfigFile> for BookingConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let countries = CountryDirectory::from_entries(file.countries)?;
        let tariff = ParcelTariff::new(file.parcel_tariff.tiers, file.parcel_tariff.oversize_price)?;
        file.search.validate()?;

        if file.parcel_rules.min_weight_grams > file.parcel_rules.max_weight_grams {
            return Err(ConfigError::Invalid(
                "parcel min_weight_grams exceeds max_weight_grams".to_string(),
            ));
        }
        if file.payment.callback_secret.len() < 16 {
            return Err(ConfigError::Invalid(
                "payment callback_secret must be at least 16 bytes".to_string(),
            ));
        }
        if !SESSION_TTL_MINS.contains(&file.payment.session_ttl_mins) {
            return Err(ConfigError::Invalid(format!(
                "payment session_ttl_mins must be between {} and {}",
                SESSION_TTL_MINS.start(),
                SESSION_TTL_MINS.end()
            )));
        }

        Ok(Self {
            countries,
            luggage_prices: file.luggage_prices,
            tariff,
            parcel_rules: file.parcel_rules,
            search: file.search,
            payment: file.payment,
        })
    }
}

/// Default interval between config reloads.
pub const DEFAULT_RELOAD_SECS: u64 = 5 * 60;

/// Parse a reload interval in seconds, falling back to the default when unset.
pub fn reload_interval(secs: Option<&str>) -> Result<std::time::Duration, ConfigError> {
    let Some(raw) = secs else {
        return Ok(std::time::Duration::from_secs(DEFAULT_RELOAD_SECS));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid(
            "reload interval must be at least one second".to_string(),
        )),
        Ok(secs) => Ok(std::time::Duration::from_secs(secs)),
        Err(_) => Err(ConfigError::Invalid(format!(
            "reload interval {raw:?} is not a number of seconds"
        ))),
    }
}

/// Shared, reloadable access to the current configuration.
///
/// Readers take a cheap `Arc` snapshot; a reload builds a complete new
/// config first and only then swaps it in, so readers never observe a
/// half-loaded state.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<BookingConfig>>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Wrap an already built config. [`ConfigHandle::reload`] is unavailable.
    pub fn new(config: BookingConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
            path: None,
        }
    }

    /// Load from a file, remembering the path for reloads.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = BookingConfig::from_file(&path).await?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
            path: Some(path),
        })
    }

    /// The current configuration snapshot.
    pub async fn current(&self) -> Arc<BookingConfig> {
        self.inner.read().await.clone()
    }

    /// Rebuild from disk and swap in.
    ///
    /// On failure the existing configuration is kept and the error returned.
    pub async fn reload(&self) -> Result<Arc<BookingConfig>, ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NotReloadable)?;
        let config = Arc::new(BookingConfig::from_file(path).await?);
        *self.inner.write().await = config.clone();
        Ok(config)
    }

    /// Replace the configuration with an already validated one.
    pub async fn replace(&self, config: BookingConfig) {
        *self.inner.write().await = Arc::new(config);
    }
}
