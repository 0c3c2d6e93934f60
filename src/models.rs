use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::errors::ScheduleError;

/// A meeting awaiting a scheduling decision. Deleted together with its
/// times and attendees once an invite has gone out.
#[derive(Debug, Clone, PartialEq, FromRow, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub description: String,
}

/// One candidate time range. `key` is the client-supplied token used in links.
#[derive(Debug, Clone, PartialEq, FromRow, serde::Serialize, serde::Deserialize)]
pub struct EventTime {
    pub id: Uuid,
    pub event_id: Uuid,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub key: String,
}

impl EventTime {
    pub fn start(&self) -> DateTime<Utc> {
        self.starts_at.and_utc()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.ends_at.and_utc()
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, serde::Serialize, serde::Deserialize)]
pub struct Attendee {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub is_sender: bool,
}

/// An event with everything it owns, as loaded for display or finalizing.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub event: Event,
    pub times: Vec<EventTime>,
    pub attendees: Vec<Attendee>,
}

impl PendingEvent {
    /// The single attendee flagged as sender. Zero or several senders is an error.
    pub fn organizer(&self) -> Result<&Attendee, ScheduleError> {
        organizer_of(&self.attendees)
    }

    pub fn time(&self, key: &str) -> Option<&EventTime> {
        self.times.iter().find(|t| t.key == key)
    }

    pub fn recipients(&self) -> Vec<String> {
        self.attendees.iter().map(|a| a.email.clone()).collect()
    }
}

pub fn organizer_of(attendees: &[Attendee]) -> Result<&Attendee, ScheduleError> {
    let mut senders = attendees.iter().filter(|a| a.is_sender);
    match (senders.next(), senders.count()) {
        (Some(organizer), 0) => Ok(organizer),
        (None, _) => Err(ScheduleError::InvalidOrganizer { senders: 0 }),
        (Some(_), rest) => Err(ScheduleError::InvalidOrganizer { senders: rest + 1 }),
    }
}
