//! Configuration error types.

use std::path::PathBuf;

use crate::tariff::TariffError;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// No countries configured
    #[error("at least one country must be configured")]
    NoCountries,

    /// Two countries share an id or a name
    #[error("duplicate country: {0}")]
    DuplicateCountry(String),

    /// A country names a time zone chrono-tz does not know
    #[error("unknown time zone {timezone} for country {country}")]
    UnknownTimezone { country: String, timezone: String },

    /// The parcel tariff is inconsistent
    #[error("invalid parcel tariff: {0}")]
    Tariff(#[from] TariffError),

    /// Any other semantic problem
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The handle has no file to reload from
    #[error("configuration was not loaded from a file")]
    NotReloadable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::UnknownTimezone {
            country: "Poland".into(),
            timezone: "Europe/Nowhere".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown time zone Europe/Nowhere for country Poland"
        );

        let err = ConfigError::Tariff(TariffError::NoTiers);
        assert_eq!(
            err.to_string(),
            "invalid parcel tariff: tariff must contain at least one size tier"
        );
    }
}
