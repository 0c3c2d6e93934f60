use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{EventStore, StoreTx};
use crate::{
    errors::ScheduleError,
    models::{Attendee, Event, EventTime, PendingEvent},
    PGPool,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PGPool,
}

impl PgStore {
    pub fn new(pool: PGPool) -> Self {
        Self { pool }
    }
}

impl EventStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, ScheduleError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx(tx))
    }
}

pub struct PgTx(Transaction<'static, Postgres>);

impl StoreTx for PgTx {
    async fn insert_event(&mut self, event: &Event) -> Result<(), ScheduleError> {
        sqlx::query("INSERT INTO events (id, title, location, description) VALUES ($1, $2, $3, $4)")
            .bind(event.id)
            .bind(&event.title)
            .bind(&event.location)
            .bind(&event.description)
            .execute(&mut *self.0)
            .await?;
        Ok(())
    }

    async fn insert_time(&mut self, time: &EventTime) -> Result<(), ScheduleError> {
        let res = sqlx::query(
            "INSERT INTO event_times (id, event_id, starts_at, ends_at, key)
            VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(time.id)
        .bind(time.event_id)
        .bind(time.starts_at)
        .bind(time.ends_at)
        .bind(&time.key)
        .execute(&mut *self.0)
        .await;
        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ScheduleError::KeyConflict { key: time.key.clone() })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_attendee(&mut self, attendee: &Attendee) -> Result<(), ScheduleError> {
        sqlx::query(
            "INSERT INTO attendees (id, event_id, name, email, is_sender)
            VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(attendee.id)
        .bind(attendee.event_id)
        .bind(&attendee.name)
        .bind(&attendee.email)
        .bind(attendee.is_sender)
        .execute(&mut *self.0)
        .await?;
        Ok(())
    }

    async fn find_by_key(&mut self, key: &str, lock: bool) -> Result<Option<PendingEvent>, ScheduleError> {
        let sql = if lock {
            "SELECT e.* FROM events e JOIN event_times t ON t.event_id = e.id
            WHERE t.key = $1 FOR UPDATE OF e"
        } else {
            "SELECT e.* FROM events e JOIN event_times t ON t.event_id = e.id
            WHERE t.key = $1"
        };
        let event = sqlx::query_as::<_, Event>(sql)
            .bind(key)
            .fetch_optional(&mut *self.0)
            .await?;
        let Some(event) = event else {
            return Ok(None);
        };

        let times = sqlx::query_as::<_, EventTime>(
            "SELECT * FROM event_times WHERE event_id = $1 ORDER BY starts_at, key",
        )
        .bind(event.id)
        .fetch_all(&mut *self.0)
        .await?;
        let attendees = sqlx::query_as::<_, Attendee>(
            "SELECT * FROM attendees WHERE event_id = $1 ORDER BY is_sender DESC, email",
        )
        .bind(event.id)
        .fetch_all(&mut *self.0)
        .await?;

        Ok(Some(PendingEvent { event, times, attendees }))
    }

    async fn delete_event(&mut self, event_id: Uuid) -> Result<u64, ScheduleError> {
        let mut rows_affected = 0;
        for sql in [
            "DELETE FROM event_times WHERE event_id = $1",
            "DELETE FROM attendees WHERE event_id = $1",
            "DELETE FROM events WHERE id = $1",
        ] {
            let res = sqlx::query(sql).bind(event_id).execute(&mut *self.0).await?;
            rows_affected += res.rows_affected();
        }
        Ok(rows_affected)
    }

    async fn commit(self) -> Result<(), ScheduleError> {
        self.0.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), ScheduleError> {
        self.0.rollback().await?;
        Ok(())
    }
}
