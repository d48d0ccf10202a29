//! Route and date search with calendar navigation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::{BookingConfig, Country};
use crate::domain::{
    ConnectionId, ConnectionStatus, CountryId, InvalidParams, Money, PartySize, Route, Volume,
};
use crate::store::{BookingStore, ConnectionView};

use super::{SearchError, country, is_bookable, local_day};

/// Request for a route/date search.
#[derive(Debug, Clone)]
pub struct RouteSearchRequest {
    pub from: CountryId,
    pub to: CountryId,
    /// Travel day, in the destination country's calendar.
    pub date: NaiveDate,
    pub party: PartySize,
    /// Neighbouring days wanted on each side. Defaults and limits come
    /// from [`super::SearchConfig`].
    pub range_width: Option<usize>,
}

/// A connection matching the requested day.
#[derive(Debug, Clone, Serialize)]
pub struct FoundConnection {
    pub id: ConnectionId,
    pub line: u16,
    pub status: ConnectionStatus,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Departure in the origin country's local time.
    pub departure_local: NaiveDateTime,
    /// Arrival in the destination country's local time.
    pub arrival_local: NaiveDateTime,
    pub price: Money,
    pub seats_left: u32,
    pub luggage_volume_left: Volume,
    /// The whole party fits in the remaining seats.
    pub fits: bool,
    /// Tickets can still be bought.
    pub available: bool,
}

/// Aggregate of one neighbouring day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Number of connections that day; zero for placeholder days.
    pub number: u32,
    pub min_price: Option<Money>,
    /// At least one connection that day is still on sale.
    pub available: bool,
}

impl DaySummary {
    fn placeholder(date: NaiveDate) -> Self {
        Self {
            date,
            number: 0,
            min_price: None,
            available: false,
        }
    }
}

/// Result of a route/date search.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSearch {
    pub date: NaiveDate,
    pub connections: Vec<FoundConnection>,
    /// Days before `date`, ascending, ending with the closest.
    pub left_range: Vec<DaySummary>,
    /// Days after `date`, ascending, starting with the closest.
    pub right_range: Vec<DaySummary>,
}

/// Finds connections for a route and day.
pub struct RouteDateSearch<'a, S> {
    store: &'a S,
    config: &'a BookingConfig,
}

impl<'a, S: BookingStore> RouteDateSearch<'a, S> {
    pub fn new(store: &'a S, config: &'a BookingConfig) -> Self {
        Self { store, config }
    }

    /// Run a search as of `now`.
    pub async fn find(
        &self,
        request: &RouteSearchRequest,
        now: DateTime<Utc>,
    ) -> Result<RouteSearch, SearchError> {
        let (origin, destination) = self.validate(request)?;
        let width = self.config.search.range_width(request.range_width);
        let route = Route::new(origin.id, destination.id);
        let party = request.party.total();

        let (start, end) = local_day(destination, request.date);
        let connections = self
            .store
            .connections_departing(&route, start, end)
            .await?
            .into_iter()
            .map(|view| found(view, origin, destination, party, now))
            .collect();

        let lookaround = self.config.search.lookaround();
        let before = self
            .summarize(&route, destination, start - lookaround, start, now)
            .await?;
        let after = self
            .summarize(&route, destination, end, end + lookaround, now)
            .await?;

        Ok(RouteSearch {
            date: request.date,
            connections,
            left_range: left_range(&before, request.date, width),
            right_range: right_range(&after, request.date, width),
        })
    }

    fn validate(
        &self,
        request: &RouteSearchRequest,
    ) -> Result<(&'a Country, &'a Country), SearchError> {
        let mut errors = InvalidParams::new();
        let origin = country(self.config, &request.from, "from", &mut errors);
        let destination = country(self.config, &request.to, "to", &mut errors);
        if request.from == request.to {
            errors.push("to", "must differ from the departure country");
        }
        if request.party.total() == 0 {
            errors.push("party", "must include at least one passenger");
        }

        match (origin, destination) {
            (Some(origin), Some(destination)) if errors.is_empty() => Ok((origin, destination)),
            _ => Err(SearchError::Validation(errors)),
        }
    }

    /// Per-day aggregates for connections departing in `[from, until)`.
    async fn summarize(
        &self,
        route: &Route,
        destination: &Country,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<NaiveDate, DaySummary>, SearchError> {
        let mut days: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();
        for view in self.store.connections_departing(route, from, until).await? {
            let connection = &view.connection;
            let date = destination.local_date(connection.departure_time);
            let day = days
                .entry(date)
                .or_insert_with(|| DaySummary::placeholder(date));
            day.number += 1;
            day.min_price = Some(match day.min_price {
                Some(price) => price.min(connection.price),
                None => connection.price,
            });
            day.available |= is_bookable(connection, now);
        }
        Ok(days)
    }
}

fn found(
    view: ConnectionView,
    origin: &Country,
    destination: &Country,
    party: u32,
    now: DateTime<Utc>,
) -> FoundConnection {
    let connection = view.connection;
    FoundConnection {
        id: connection.id,
        line: connection.line,
        status: connection.status(),
        departure_local: connection
            .departure_time
            .with_timezone(&origin.timezone)
            .naive_local(),
        arrival_local: connection
            .arrival_time
            .with_timezone(&destination.timezone)
            .naive_local(),
        departure_time: connection.departure_time,
        arrival_time: connection.arrival_time,
        price: connection.price,
        seats_left: view.availability.seats_left,
        luggage_volume_left: view.availability.luggage_volume_left,
        fits: view.availability.fits_party(party),
        available: is_bookable(&connection, now),
    }
}

/// The `width` known days closest before `date`, padded outward with
/// placeholders, in ascending order.
fn left_range(
    days: &BTreeMap<NaiveDate, DaySummary>,
    date: NaiveDate,
    width: usize,
) -> Vec<DaySummary> {
    let mut range: Vec<DaySummary> = days
        .range(..date)
        .rev()
        .take(width)
        .map(|(_, day)| day.clone())
        .collect();

    let mut cursor = range.last().map_or(date, |day| day.date);
    while range.len() < width {
        let Some(previous) = cursor.pred_opt() else {
            break;
        };
        range.push(DaySummary::placeholder(previous));
        cursor = previous;
    }

    range.reverse();
    range
}

/// The `width` known days closest after `date`, padded outward with
/// placeholders, in ascending order.
fn right_range(
    days: &BTreeMap<NaiveDate, DaySummary>,
    date: NaiveDate,
    width: usize,
) -> Vec<DaySummary> {
    let mut range: Vec<DaySummary> = days
        .range(date..)
        .filter(|(day, _)| **day > date)
        .take(width)
        .map(|(_, day)| day.clone())
        .collect();

    let mut cursor = range.last().map_or(date, |day| day.date);
    while range.len() < width {
        let Some(next) = cursor.succ_opt() else {
            break;
        };
        range.push(DaySummary::placeholder(next));
        cursor = next;
    }

    range
}
