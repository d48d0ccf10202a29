//! Monthly parcel calendar.
//!
//! For each day of a month the planner offers at most one connection: the
//! one with the most luggage volume left. The result is laid out as whole
//! weeks, Monday first, so it can be rendered as a calendar grid without
//! further date arithmetic.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::config::{BookingConfig, Country};
use crate::domain::{BoxDimensions, ConnectionId, CountryId, InvalidParams, Money, Route, Volume};
use crate::store::{BookingStore, ConnectionView};

use super::{SearchError, country, is_bookable};

/// Request for a month of parcel availability.
#[derive(Debug, Clone)]
pub struct MonthRequest {
    pub from: CountryId,
    pub to: CountryId,
    pub year: i32,
    pub month: u32,
    pub dimensions: BoxDimensions,
}

/// The connection chosen for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayConnection {
    pub id: ConnectionId,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub luggage_volume_left: Volume,
    /// The parcel fits in the remaining luggage volume.
    pub fits: bool,
    /// Tariff price of the parcel.
    pub price: Money,
}

/// One cell of the calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// 1 = Monday .. 7 = Sunday.
    pub weekday: u32,
    pub day_of_month: u32,
    pub is_current_month: bool,
    pub usable: bool,
    pub connection: Option<DayConnection>,
}

impl CalendarDay {
    fn empty(date: NaiveDate, is_current_month: bool) -> Self {
        Self {
            date,
            weekday: date.weekday().number_from_monday(),
            day_of_month: date.day(),
            is_current_month,
            usable: false,
            connection: None,
        }
    }
}

/// Plans parcel shipments over a month.
pub struct ParcelMonthlyPlanner<'a, S> {
    store: &'a S,
    config: &'a BookingConfig,
}

impl<'a, S: BookingStore> ParcelMonthlyPlanner<'a, S> {
    pub fn new(store: &'a S, config: &'a BookingConfig) -> Self {
        Self { store, config }
    }

    /// Build the calendar grid for a month as of `now`.
    ///
    /// Days are bucketed by the departure country's calendar, since that is
    /// where the parcel is handed over.
    pub async fn plan_month(
        &self,
        request: &MonthRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarDay>, SearchError> {
        let (origin, first, last) = self.validate(request)?;
        let route = Route::new(request.from, request.to);

        let next_month = last.succ_opt().unwrap_or(last);
        let views = self
            .store
            .connections_departing(
                &route,
                origin.start_of_day(first),
                origin.start_of_day(next_month),
            )
            .await?;

        let best = best_per_day(origin, views, now);
        if best.is_empty() {
            return Err(SearchError::NotYetAvailable);
        }

        let volume = request.dimensions.volume();
        let price = self.config.tariff.price(&request.dimensions);

        let mut grid = leading_days(first);
        grid.extend(first.iter_days().take_while(|d| *d <= last).map(|date| {
            let mut day = CalendarDay::empty(date, true);
            if let Some(view) = best.get(&date) {
                let left = view.availability.luggage_volume_left;
                day.usable = true;
                day.connection = Some(DayConnection {
                    id: view.connection.id,
                    departure_time: view.connection.departure_time,
                    arrival_time: view.connection.arrival_time,
                    luggage_volume_left: left,
                    fits: volume <= left,
                    price,
                });
            }
            day
        }));
        grid.extend(trailing_days(last));
        Ok(grid)
    }

    fn validate(
        &self,
        request: &MonthRequest,
    ) -> Result<(&'a Country, NaiveDate, NaiveDate), SearchError> {
        let mut errors = InvalidParams::new();
        let origin = country(self.config, &request.from, "from", &mut errors);
        country(self.config, &request.to, "to", &mut errors);
        if request.from == request.to {
            errors.push("to", "must differ from the departure country");
        }

        self.config
            .parcel_rules
            .check_dimensions(&request.dimensions, "", &mut errors);

        let bounds = month_bounds(request.year, request.month);
        if bounds.is_none() {
            errors.push("month", "must be between 1 and 12");
        }

        match (origin, bounds) {
            (Some(origin), Some((first, last))) if errors.is_empty() => Ok((origin, first, last)),
            _ => Err(SearchError::Validation(errors)),
        }
    }
}

/// First and last day of a month.
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// For each local day, the bookable connection with the most luggage volume
/// left. Ties go to the earliest departure.
fn best_per_day(
    origin: &Country,
    views: Vec<ConnectionView>,
    now: DateTime<Utc>,
) -> BTreeMap<NaiveDate, ConnectionView> {
    let mut best: BTreeMap<NaiveDate, ConnectionView> = BTreeMap::new();
    for view in views {
        if !is_bookable(&view.connection, now) {
            continue;
        }
        let date = origin.local_date(view.connection.departure_time);
        let better = best.get(&date).is_none_or(|current| {
            let left = view.availability.luggage_volume_left;
            let current_left = current.availability.luggage_volume_left;
            left > current_left
                || (left == current_left
                    && view.connection.departure_time < current.connection.departure_time)
        });
        if better {
            best.insert(date, view);
        }
    }
    best
}

/// Days of the previous month filling the first week up to `first`.
fn leading_days(first: NaiveDate) -> Vec<CalendarDay> {
    let pad = i64::from(first.weekday().number_from_monday()) - 1;
    (1..=pad)
        .rev()
        .map(|back| CalendarDay::empty(first - Duration::days(back), false))
        .collect()
}

/// Days of the next month filling the last week after `last`.
fn trailing_days(last: NaiveDate) -> Vec<CalendarDay> {
    let pad = 7 - i64::from(last.weekday().number_from_monday());
    (1..=pad)
        .map(|ahead| CalendarDay::empty(last + Duration::days(ahead), false))
        .collect()
}
