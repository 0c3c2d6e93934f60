#![allow(async_fn_in_trait)]

pub mod event;
#[cfg(test)]
pub mod memory;

use crate::{
    config::DatabaseConfig,
    errors::ScheduleError,
    models::{Attendee, Event, EventTime, PendingEvent},
    PGPool,
};
use log::{error, info};
use sqlx::postgres::PgPoolOptions;

pub async fn init_db_pool(config: &DatabaseConfig) -> Result<PGPool, sqlx::Error> {
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await?;
    info!("connected to postgresql");
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Storage for pending events. Every read and write goes through a [`StoreTx`].
pub trait EventStore {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, ScheduleError>;
}

pub trait StoreTx: Sized {
    async fn insert_event(&mut self, event: &Event) -> Result<(), ScheduleError>;

    /// Fails with `KeyConflict` when another pending time already uses `time.key`.
    async fn insert_time(&mut self, time: &EventTime) -> Result<(), ScheduleError>;

    async fn insert_attendee(&mut self, attendee: &Attendee) -> Result<(), ScheduleError>;

    /// Loads the event owning `key`. With `lock` set, the event row stays
    /// exclusively locked until the transaction ends.
    async fn find_by_key(&mut self, key: &str, lock: bool) -> Result<Option<PendingEvent>, ScheduleError>;

    /// Deletes times, then attendees, then the event. Returns rows removed.
    async fn delete_event(&mut self, event_id: uuid::Uuid) -> Result<u64, ScheduleError>;

    async fn commit(self) -> Result<(), ScheduleError>;

    async fn rollback(self) -> Result<(), ScheduleError>;
}

/// Ends a transaction according to the outcome of its body: commit on `Ok`,
/// roll back and hand the original error back on `Err`.
pub async fn settle<T, R>(tx: T, result: Result<R, ScheduleError>) -> Result<R, ScheduleError>
where
    T: StoreTx,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("rollback failed after '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
