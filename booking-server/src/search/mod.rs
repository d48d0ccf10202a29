//! Availability search.
//!
//! Two read-only queries over the store:
//!
//! - [`RouteDateSearch`] answers "which buses go from A to B on this day,
//!   and is there room for my party?" together with a strip of nearby days
//!   for calendar navigation.
//! - [`ParcelMonthlyPlanner`] picks the roomiest connection per day of a
//!   month for sending a parcel, laid out as full Monday-to-Sunday weeks.
//!
//! Every calendar-day comparison is made in a country's local time, never
//! in UTC.

mod calendar;
mod config;
mod route_date;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{BookingConfig, Country};
use crate::domain::{Connection, CountryId, InvalidParams};
use crate::store::StoreError;

pub use calendar::{CalendarDay, DayConnection, MonthRequest, ParcelMonthlyPlanner};
pub use config::SearchConfig;
pub use route_date::{DaySummary, FoundConnection, RouteDateSearch, RouteSearch, RouteSearchRequest};

/// Error from availability search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request is malformed
    #[error("invalid search request: {0}")]
    Validation(InvalidParams),

    /// Nothing is scheduled for the requested period yet
    #[error("no connections are scheduled for the requested period yet")]
    NotYetAvailable,

    /// The store failed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<InvalidParams> for SearchError {
    fn from(params: InvalidParams) -> Self {
        SearchError::Validation(params)
    }
}

/// Resolve a country id from a request parameter, recording a field error.
fn country<'a>(
    config: &'a BookingConfig,
    id: &CountryId,
    field: &str,
    errors: &mut InvalidParams,
) -> Option<&'a Country> {
    let country = config.countries.get(id);
    if country.is_none() {
        errors.push(field, "unknown country");
    }
    country
}

/// The UTC half-open interval covering a local calendar day.
fn local_day(country: &Country, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (country.start_of_day(date), country.start_of_day(next))
}

/// Whether a connection accepts new purchases at `now`.
fn is_bookable(connection: &Connection, now: DateTime<Utc>) -> bool {
    connection.status().is_open_for_sale() && connection.is_on_sale_at(now)
}
