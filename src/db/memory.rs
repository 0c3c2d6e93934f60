use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{EventStore, StoreTx};
use crate::{
    errors::ScheduleError,
    models::{Attendee, Event, EventTime, PendingEvent},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub events: Vec<Event>,
    pub times: Vec<EventTime>,
    pub attendees: Vec<Attendee>,
}

/// In-memory store with whole-store transactions: a transaction holds the
/// only lock and works on a copy that replaces the tables on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }
}

impl EventStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, ScheduleError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl StoreTx for MemoryTx {
    async fn insert_event(&mut self, event: &Event) -> Result<(), ScheduleError> {
        self.working.events.push(event.clone());
        Ok(())
    }

    async fn insert_time(&mut self, time: &EventTime) -> Result<(), ScheduleError> {
        if self.working.times.iter().any(|t| t.key == time.key) {
            return Err(ScheduleError::KeyConflict { key: time.key.clone() });
        }
        self.working.times.push(time.clone());
        Ok(())
    }

    async fn insert_attendee(&mut self, attendee: &Attendee) -> Result<(), ScheduleError> {
        self.working.attendees.push(attendee.clone());
        Ok(())
    }

    async fn find_by_key(&mut self, key: &str, _lock: bool) -> Result<Option<PendingEvent>, ScheduleError> {
        let tables = &self.working;
        let Some(time) = tables.times.iter().find(|t| t.key == key) else {
            return Ok(None);
        };
        let Some(event) = tables.events.iter().find(|e| e.id == time.event_id) else {
            return Ok(None);
        };
        let mut times: Vec<EventTime> =
            tables.times.iter().filter(|t| t.event_id == event.id).cloned().collect();
        times.sort_by(|a, b| (a.starts_at, &a.key).cmp(&(b.starts_at, &b.key)));
        let mut attendees: Vec<Attendee> =
            tables.attendees.iter().filter(|a| a.event_id == event.id).cloned().collect();
        attendees.sort_by(|a, b| (!a.is_sender, &a.email).cmp(&(!b.is_sender, &b.email)));

        Ok(Some(PendingEvent { event: event.clone(), times, attendees }))
    }

    async fn delete_event(&mut self, event_id: Uuid) -> Result<u64, ScheduleError> {
        let tables = &mut self.working;
        let before = tables.times.len() + tables.attendees.len() + tables.events.len();
        tables.times.retain(|t| t.event_id != event_id);
        tables.attendees.retain(|a| a.event_id != event_id);
        tables.events.retain(|e| e.id != event_id);
        let after = tables.times.len() + tables.attendees.len() + tables.events.len();
        Ok((before - after) as u64)
    }

    async fn commit(self) -> Result<(), ScheduleError> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), ScheduleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee(event_id: Uuid, email: &str, is_sender: bool) -> Attendee {
        Attendee { id: Uuid::new_v4(), event_id, name: email.to_string(), email: email.to_string(), is_sender }
    }

    #[actix_rt::test]
    async fn attendees_come_back_sender_first_then_by_email() {
        let store = MemoryStore::default();
        let event = Event {
            id: Uuid::new_v4(),
            title: "Sync".to_string(),
            location: String::new(),
            description: String::new(),
        };
        let starts_at = chrono::DateTime::from_timestamp(1_704_103_200, 0).unwrap().naive_utc();
        let time = EventTime {
            id: Uuid::new_v4(),
            event_id: event.id,
            starts_at,
            ends_at: starts_at + chrono::Duration::minutes(30),
            key: "A".to_string(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_event(&event).await.unwrap();
        tx.insert_time(&time).await.unwrap();
        for a in [
            attendee(event.id, "zed@x", false),
            attendee(event.id, "carol@x", false),
            attendee(event.id, "mallory@x", true),
        ] {
            tx.insert_attendee(&a).await.unwrap();
        }
        let pending = tx.find_by_key("A", false).await.unwrap().unwrap();
        tx.commit().await.unwrap();

        assert_eq!(pending.recipients(), vec!["mallory@x", "carol@x", "zed@x"]);
    }
}
