//! Pick-up and drop-off stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ParcelId, StopId, TicketId};

/// Which end of the trip a stop represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLocation {
    PickUp,
    DropOff,
}

/// What is picked up or dropped off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum StopSubject {
    Passenger(TicketId),
    Parcel(ParcelId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Confirmed,
    Missed,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopUpdate {
    pub status: StopStatus,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

/// One stop of a connection, always created in pick-up/drop-off pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stop {
    pub id: StopId,
    pub location: StopLocation,
    pub subject: StopSubject,
    pub log: Vec<StopUpdate>,
}

impl Stop {
    /// The pick-up and drop-off stops for one purchased item.
    pub fn pair(subject: StopSubject) -> [Stop; 2] {
        [StopLocation::PickUp, StopLocation::DropOff].map(|location| Stop {
            id: StopId::new(),
            location,
            subject,
            log: Vec::new(),
        })
    }

    pub fn is_pick_up(&self) -> bool {
        self.location == StopLocation::PickUp
    }

    /// Latest recorded status, if any.
    pub fn status(&self) -> Option<StopStatus> {
        self.log.last().map(|u| u.status)
    }

    pub fn record(&mut self, status: StopStatus, at: DateTime<Utc>) {
        self.log.push(StopUpdate {
            status,
            at,
            comment: String::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_has_both_ends() {
        let ticket = TicketId::new();
        let [pick, drop] = Stop::pair(StopSubject::Passenger(ticket));
        assert!(pick.is_pick_up());
        assert!(!drop.is_pick_up());
        assert_eq!(pick.subject, drop.subject);
        assert_ne!(pick.id, drop.id);
        assert_eq!(pick.status(), None);
    }

    #[test]
    fn status_is_latest_update() {
        let [mut stop, _] = Stop::pair(StopSubject::Parcel(ParcelId::new()));
        let now = Utc::now();
        stop.record(StopStatus::Confirmed, now);
        stop.record(StopStatus::Completed, now);
        assert_eq!(stop.status(), Some(StopStatus::Completed));
    }
}
