//! Country directory with time zones.
//!
//! All instants are stored in UTC. Calendar-day questions ("which day does
//! this bus leave on?") must be answered in the relevant country's local
//! time, otherwise trips near midnight land on the wrong day.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::CountryId;

use super::error::ConfigError;

/// Offsets from midnight tried when looking for the start of a day.
const DAY_STEP_MINS: i64 = 15;
const DAY_STEPS: i64 = 24 * 60 / DAY_STEP_MINS;

/// A country served by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    pub timezone: Tz,
}

impl Country {
    /// Local calendar day of an instant in this country.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// The UTC instant at which a local calendar day starts.
    ///
    /// When a DST gap swallows midnight the day starts at the first local
    /// time that exists.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        (0..DAY_STEPS)
            .map(|step| midnight + Duration::minutes(step * DAY_STEP_MINS))
            .find_map(|local| self.timezone.from_local_datetime(&local).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }
}

/// Serialized form of a country entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryEntry {
    pub id: CountryId,
    pub name: String,
    pub timezone: String,
}

/// Lookup of countries by id and by name.
#[derive(Debug, Clone, Default)]
pub struct CountryDirectory {
    by_id: HashMap<CountryId, Country>,
    by_name: HashMap<String, CountryId>,
}

impl CountryDirectory {
    /// Build the directory, rejecting duplicates and unknown time zones.
    pub fn from_entries(entries: Vec<CountryEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoCountries);
        }

        let mut directory = Self::default();
        for entry in entries {
            let timezone: Tz = entry
                .timezone
                .parse()
                .map_err(|_| ConfigError::UnknownTimezone {
                    country: entry.name.clone(),
                    timezone: entry.timezone.clone(),
                })?;

            let key = normalize(&entry.name);
            if directory.by_id.contains_key(&entry.id) || directory.by_name.contains_key(&key) {
                return Err(ConfigError::DuplicateCountry(entry.name));
            }

            directory.by_name.insert(key, entry.id);
            directory.by_id.insert(
                entry.id,
                Country {
                    id: entry.id,
                    name: entry.name,
                    timezone,
                },
            );
        }
        Ok(directory)
    }

    pub fn get(&self, id: &CountryId) -> Option<&Country> {
        self.by_id.get(id)
    }

    /// Time zone of a country.
    pub fn timezone(&self, id: &CountryId) -> Option<Tz> {
        self.by_id.get(id).map(|c| c.timezone)
    }

    /// Find a country by name (case-insensitive) or by its id string.
    pub fn resolve(&self, name_or_id: &str) -> Option<&Country> {
        if let Some(id) = self.by_name.get(&normalize(name_or_id)) {
            return self.by_id.get(id);
        }
        CountryId::parse(name_or_id.trim())
            .ok()
            .and_then(|id| self.by_id.get(&id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
