//! iCalendar invite generation.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, EventLike, Property};

use crate::{
    errors::ScheduleError,
    models::{EventTime, PendingEvent},
};

pub const PRODID: &str = "N1-send-availability-package";
const PRIORITY: u8 = 5;

/// A serialized `METHOD:REQUEST` calendar holding a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub uid: String,
    pub ics: String,
}

pub fn build_invite(pending: &PendingEvent, time: &EventTime) -> Result<Invite, ScheduleError> {
    build_invite_at(pending, time, Utc::now())
}

/// Builds the invite with `stamp` as the generation time; the UID combines
/// the stamp with the organizer email so repeated sends stay distinct.
pub fn build_invite_at(
    pending: &PendingEvent,
    time: &EventTime,
    stamp: DateTime<Utc>,
) -> Result<Invite, ScheduleError> {
    let organizer = pending.organizer()?;
    let event = &pending.event;
    let uid = format!("{}/{}", stamp.timestamp(), organizer.email);

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&uid);
    ics_event.summary(&event.title);
    ics_event.location(&event.location);
    ics_event.description(&event.description);
    ics_event.add_property("DTSTART", utc_stamp(time.start()));
    ics_event.add_property("DTEND", utc_stamp(time.end()));
    ics_event.add_property("DTSTAMP", utc_stamp(stamp));
    ics_event.add_property("PRIORITY", PRIORITY.to_string());

    let mut prop = Property::new("ORGANIZER", format!("mailto:{}", organizer.email));
    prop.add_parameter("CN", &organizer.name);
    prop.add_parameter("ROLE", "CHAIR");
    ics_event.append_property(prop);

    for attendee in &pending.attendees {
        let mut prop = Property::new("ATTENDEE", format!("mailto:{}", attendee.email));
        prop.add_parameter("CN", &attendee.name);
        prop.add_parameter("ROLE", "REQ-PARTICIPANT");
        ics_event.append_multi_property(prop);
    }

    let mut cal = Calendar::new();
    cal.append_property(Property::new("METHOD", "REQUEST"));
    cal.push(ics_event.done());
    let cal = cal.done();

    Ok(Invite { uid, ics: rewrite_prodid(&cal.to_string()) })
}

fn utc_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn rewrite_prodid(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
        } else {
            result.push_str(line);
        }
        result.push_str("\r\n");
    }
    result
}
