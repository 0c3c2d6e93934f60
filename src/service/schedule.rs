use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime};
use log::{error, info, warn};
use uuid::Uuid;

use super::{email::build_email, invite::build_invite, transport::Mailer};
use crate::{
    db::{settle, EventStore, StoreTx},
    dto::RegisterEventsDto,
    errors::ScheduleError,
    models::{organizer_of, Attendee, Event, EventTime, PendingEvent},
};

const MAX_FIELD_CHARS: usize = 255;

/// Rows making up a new pending event, validated and ready to insert.
struct NewEventRows {
    event: Event,
    times: Vec<EventTime>,
    attendees: Vec<Attendee>,
}

pub async fn register<S: EventStore>(store: &S, dto: RegisterEventsDto) -> Result<PendingEvent, ScheduleError> {
    let rows = validate(dto).map_err(|err| {
        warn!("rejected registration: {}", err);
        err
    })?;

    let mut tx = store.begin().await?;
    let res = insert_rows(&mut tx, &rows).await;
    settle(tx, res).await.map_err(|err| {
        warn!("registration of '{}' rolled back: {}", rows.event.title, err);
        err
    })?;

    info!(
        "registered event {} with {} times and {} attendees",
        rows.event.id,
        rows.times.len(),
        rows.attendees.len()
    );
    Ok(PendingEvent { event: rows.event, times: rows.times, attendees: rows.attendees })
}

async fn insert_rows<T: StoreTx>(tx: &mut T, rows: &NewEventRows) -> Result<(), ScheduleError> {
    tx.insert_event(&rows.event).await?;
    for time in &rows.times {
        tx.insert_time(time).await?;
    }
    for attendee in &rows.attendees {
        tx.insert_attendee(attendee).await?;
    }
    Ok(())
}

fn validate(dto: RegisterEventsDto) -> Result<NewEventRows, ScheduleError> {
    if dto.times.is_empty() {
        return Err(ScheduleError::bad_request("at least one time is required"));
    }
    if dto.event.title.trim().is_empty() {
        return Err(ScheduleError::bad_request("event title is required"));
    }
    check_field("event title", &dto.event.title)?;

    let event = Event {
        id: Uuid::new_v4(),
        title: dto.event.title,
        location: dto.event.location,
        description: dto.event.description,
    };

    let mut keys = HashSet::new();
    let mut times = Vec::with_capacity(dto.times.len());
    for time in dto.times {
        if time.server_key.is_empty() {
            return Err(ScheduleError::bad_request("time key must not be empty"));
        }
        check_field("time key", &time.server_key)?;
        if !keys.insert(time.server_key.clone()) {
            return Err(ScheduleError::KeyConflict { key: time.server_key });
        }
        let starts_at = from_epoch(time.start)?;
        let ends_at = from_epoch(time.end)?;
        if starts_at >= ends_at {
            return Err(ScheduleError::bad_request(format!(
                "time '{}' must start before it ends",
                time.server_key
            )));
        }
        times.push(EventTime {
            id: Uuid::new_v4(),
            event_id: event.id,
            starts_at,
            ends_at,
            key: time.server_key,
        });
    }

    let mut attendees = Vec::with_capacity(dto.attendees.len());
    for attendee in dto.attendees {
        check_field("attendee name", &attendee.name)?;
        check_field("attendee email", &attendee.email)?;
        if !attendee.email.contains('@')
            || attendee.email.contains(char::is_whitespace)
            || attendee.email.contains([',', '<', '>', '"'])
        {
            return Err(ScheduleError::bad_request(format!(
                "invalid attendee email '{}'",
                attendee.email
            )));
        }
        attendees.push(Attendee {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: attendee.name,
            email: attendee.email,
            is_sender: attendee.is_sender,
        });
    }
    organizer_of(&attendees)?;

    Ok(NewEventRows { event, times, attendees })
}

/// Single-line text that fits the `VARCHAR(255)` columns.
fn check_field(field: &str, value: &str) -> Result<(), ScheduleError> {
    if value.chars().any(char::is_control) {
        return Err(ScheduleError::bad_request(format!("{field} must not contain control characters")));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(ScheduleError::bad_request(format!(
            "{field} is longer than {MAX_FIELD_CHARS} characters"
        )));
    }
    Ok(())
}

fn from_epoch(secs: i64) -> Result<NaiveDateTime, ScheduleError> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| ScheduleError::bad_request(format!("timestamp {secs} out of range")))
}

/// Read-only lookup backing the selection page.
pub async fn load<S: EventStore>(store: &S, key: &str) -> Result<PendingEvent, ScheduleError> {
    let mut tx = store.begin().await?;
    let res = tx.find_by_key(key, false).await;
    settle(tx, res).await?.ok_or(ScheduleError::NotFound)
}

/// Resolves the event owning `key`: sends the invite for that time, then
/// deletes the event with all its times and attendees.
///
/// The event row stays locked from lookup to commit, so a concurrent
/// finalize of a sibling key waits and then finds nothing to send.
/// A failed send rolls everything back and leaves the event schedulable.
pub async fn finalize<S: EventStore, M: Mailer>(
    store: &S,
    mailer: &M,
    sender: &str,
    key: &str,
) -> Result<PendingEvent, ScheduleError> {
    let mut tx = store.begin().await?;
    let res = resolve(&mut tx, mailer, sender, key).await;
    match settle(tx, res).await {
        Ok(pending) => {
            info!("event {} scheduled for time '{}'", pending.event.id, key);
            Ok(pending)
        }
        Err(ScheduleError::NotFound) => {
            warn!("finalize for unknown time key '{}'", key);
            Err(ScheduleError::NotFound)
        }
        Err(err) => {
            error!("finalize for time key '{}' failed: {}", key, err);
            Err(err)
        }
    }
}

async fn resolve<T: StoreTx, M: Mailer>(
    tx: &mut T,
    mailer: &M,
    sender: &str,
    key: &str,
) -> Result<PendingEvent, ScheduleError> {
    let pending = tx.find_by_key(key, true).await?.ok_or(ScheduleError::NotFound)?;
    let time = pending.time(key).ok_or(ScheduleError::NotFound)?;

    let invite = build_invite(&pending, time)?;
    let message = build_email(&pending, time, invite, sender)?;
    mailer.send(&message).await?;

    tx.delete_event(pending.event.id).await?;
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::MemoryStore,
        dto::{NewAttendeeDto, NewEventDto, NewTimeDto},
        service::transport::testing::RecordingMailer,
    };

    const SENDER: &str = "send-availability@nylas.com";
    // 2024-01-01T10:00:00Z and 2024-01-01T14:00:00Z
    const TEN: i64 = 1_704_103_200;
    const TWO_PM: i64 = 1_704_117_600;

    fn time(key: &str, start: i64) -> NewTimeDto {
        NewTimeDto { start, end: start + 30 * 60, server_key: key.to_string() }
    }

    fn attendee(name: &str, email: &str, is_sender: bool) -> NewAttendeeDto {
        NewAttendeeDto { name: name.to_string(), email: email.to_string(), is_sender }
    }

    pub fn sync_dto() -> RegisterEventsDto {
        RegisterEventsDto {
            times: vec![time("A", TEN), time("B", TWO_PM)],
            attendees: vec![attendee("Alice", "alice@x", true), attendee("Bob", "bob@x", false)],
            event: NewEventDto {
                title: "Sync".to_string(),
                description: "Weekly planning".to_string(),
                location: "Room 4".to_string(),
            },
        }
    }

    #[actix_rt::test]
    async fn register_persists_every_time_under_its_key() {
        let store = MemoryStore::default();
        register(&store, sync_dto()).await.unwrap();

        let tables = store.snapshot().await;
        assert_eq!(tables.events.len(), 1);
        let keys: Vec<&str> = tables.times.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(tables.times[0].start().timestamp(), TEN);
        assert_eq!(tables.attendees.len(), 2);
    }

    #[actix_rt::test]
    async fn colliding_key_rejects_the_whole_registration() {
        let store = MemoryStore::default();
        register(&store, sync_dto()).await.unwrap();
        let before = store.snapshot().await;

        let mut dto = sync_dto();
        dto.times = vec![time("C", TEN), time("B", TWO_PM)];
        let err = register(&store, dto).await.unwrap_err();

        assert_eq!(err, ScheduleError::KeyConflict { key: "B".to_string() });
        assert_eq!(store.snapshot().await, before);
    }

    #[actix_rt::test]
    async fn duplicate_key_within_one_request_is_rejected() {
        let store = MemoryStore::default();
        let mut dto = sync_dto();
        dto.times = vec![time("A", TEN), time("A", TWO_PM)];

        let err = register(&store, dto).await.unwrap_err();
        assert_eq!(err, ScheduleError::KeyConflict { key: "A".to_string() });
        assert!(store.snapshot().await.events.is_empty());
    }

    #[actix_rt::test]
    async fn sender_count_is_enforced_on_write() {
        let store = MemoryStore::default();

        let mut none = sync_dto();
        none.attendees[0].is_sender = false;
        assert_eq!(
            register(&store, none).await.unwrap_err(),
            ScheduleError::InvalidOrganizer { senders: 0 }
        );

        let mut two = sync_dto();
        two.attendees[1].is_sender = true;
        assert_eq!(
            register(&store, two).await.unwrap_err(),
            ScheduleError::InvalidOrganizer { senders: 2 }
        );
        assert!(store.snapshot().await.events.is_empty());
    }

    #[actix_rt::test]
    async fn line_breaks_in_header_fields_are_rejected() {
        let store = MemoryStore::default();

        let mut title = sync_dto();
        title.event.title = "Sync\r\nBcc: victim@evil.example".to_string();
        let mut name = sync_dto();
        name.attendees[1].name = "Bob\nBcc: victim@evil.example".to_string();
        let mut email = sync_dto();
        email.attendees[1].email = "bob@x\r\nBcc: victim@evil.example".to_string();
        let mut nul = sync_dto();
        nul.times[0].server_key = "A\0".to_string();
        let mut list = sync_dto();
        list.attendees[1].email = "bob@x, victim@evil.example".to_string();

        for dto in [title, name, email, nul, list] {
            assert!(matches!(
                register(&store, dto).await,
                Err(ScheduleError::BadClientData { .. })
            ));
        }
        assert!(store.snapshot().await.events.is_empty());
    }

    #[actix_rt::test]
    async fn overlong_fields_are_bad_input() {
        let store = MemoryStore::default();

        let mut title = sync_dto();
        title.event.title = "x".repeat(256);
        let mut key = sync_dto();
        key.times[1].server_key = "k".repeat(256);
        let mut email = sync_dto();
        email.attendees[1].email = format!("{}@x", "b".repeat(254));

        for dto in [title, key, email] {
            assert!(matches!(
                register(&store, dto).await,
                Err(ScheduleError::BadClientData { .. })
            ));
        }

        let mut longest = sync_dto();
        longest.event.title = "é".repeat(255);
        assert!(register(&store, longest).await.is_ok());
    }

    #[actix_rt::test]
    async fn inverted_time_range_is_bad_input() {
        let store = MemoryStore::default();
        let mut dto = sync_dto();
        dto.times[0].end = dto.times[0].start;
        assert!(matches!(
            register(&store, dto).await,
            Err(ScheduleError::BadClientData { .. })
        ));
    }

    #[actix_rt::test]
    async fn finalize_unknown_key_changes_nothing() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        register(&store, sync_dto()).await.unwrap();
        let before = store.snapshot().await;

        let err = finalize(&store, &mailer, SENDER, "nope").await.unwrap_err();

        assert_eq!(err, ScheduleError::NotFound);
        assert_eq!(mailer.attempts(), 0);
        assert_eq!(store.snapshot().await, before);
    }

    #[actix_rt::test]
    async fn finalize_sends_once_then_removes_everything() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        register(&store, sync_dto()).await.unwrap();

        finalize(&store, &mailer, SENDER, "A").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["alice@x", "bob@x"]);
        assert!(sent[0].invite.ics.contains("DTSTART:20240101T100000Z"));
        assert_eq!(store.snapshot().await, Default::default());

        assert_eq!(load(&store, "B").await.unwrap_err(), ScheduleError::NotFound);
    }

    #[actix_rt::test]
    async fn transport_failure_keeps_event_and_retry_succeeds() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::failing();
        register(&store, sync_dto()).await.unwrap();
        let before = store.snapshot().await;

        let err = finalize(&store, &mailer, SENDER, "B").await.unwrap_err();
        assert!(matches!(err, ScheduleError::TransportFailure { .. }));
        assert_eq!(store.snapshot().await, before);
        assert!(load(&store, "B").await.is_ok());

        mailer.set_failing(false);
        finalize(&store, &mailer, SENDER, "B").await.unwrap();
        assert_eq!(mailer.attempts(), 2);
        assert!(mailer.sent()[0].invite.ics.contains("DTSTART:20240101T140000Z"));
        assert!(store.snapshot().await.events.is_empty());
    }

    #[actix_rt::test]
    async fn racing_finalizes_send_exactly_once() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        register(&store, sync_dto()).await.unwrap();

        let (a, b) = futures_util::join!(
            finalize(&store, &mailer, SENDER, "A"),
            finalize(&store, &mailer, SENDER, "B"),
        );

        assert!(a.is_ok() != b.is_ok(), "exactly one finalize should win");
        let loser = if a.is_ok() { b } else { a };
        assert_eq!(loser.unwrap_err(), ScheduleError::NotFound);
        assert_eq!(mailer.sent().len(), 1);
    }
}
