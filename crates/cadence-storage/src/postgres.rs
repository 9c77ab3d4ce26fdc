//! PostgreSQL implementation of EventStore
//!
//! - One sqlx transaction per unit of work
//! - `pg_advisory_xact_lock` serializes check-then-write across requests
//! - Timestamps bound as UTC, offsets kept in companion columns

use async_trait::async_trait;
use cadence_core::{
    Event, EventQuery, EventStore, EventTransaction, NewEvent, OccurrenceWindow, StoreError,
    StoreResult,
};
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::models::{offset_of, EventRow, EVENT_COLUMNS};

/// Advisory lock key shared by every event unit of work
const EVENTS_LOCK_KEY: i64 = 0x6361_6465_6e63_6531;

fn database(action: &str, e: sqlx::Error) -> StoreError {
    error!("Failed to {}: {}", action, e);
    StoreError::Database(e.to_string())
}

fn utc(value: &DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

/// PostgreSQL event store
///
/// ```ignore
/// let store = PgEventStore::connect("postgres://localhost/cadence", 10).await?;
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a connection pool from URL
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> StoreResult<Box<dyn EventTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database("begin transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(EVENTS_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| database("acquire events lock", e))?;

        Ok(Box::new(PgEventTransaction { tx: Some(tx) }))
    }
}

/// Unit of work backed by a sqlx transaction; rolled back when dropped
pub struct PgEventTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgEventTransaction {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::Closed)
    }

    fn into_events(rows: Vec<EventRow>) -> StoreResult<Vec<Event>> {
        rows.into_iter().map(Event::try_from).collect()
    }
}

#[async_trait]
impl EventTransaction for PgEventTransaction {
    #[instrument(skip(self, event), fields(parent_id = ?event.parent_id))]
    async fn insert(&mut self, event: NewEvent) -> StoreResult<Event> {
        let draft = &event.draft;
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO events (
                id, title, description,
                starts_at, starts_at_offset, ends_at, ends_at_offset,
                recurrent, frequency, repeat_until, repeat_until_offset, parent_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(utc(&draft.starts_at))
        .bind(offset_of(&draft.starts_at))
        .bind(utc(&draft.ends_at))
        .bind(offset_of(&draft.ends_at))
        .bind(draft.recurrent)
        .bind(draft.frequency.map(|f| f.as_str()))
        .bind(draft.repeat_until.as_ref().map(utc))
        .bind(draft.repeat_until.as_ref().map(offset_of))
        .bind(event.parent_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| database("insert event", e))?;

        debug!(event_id = %row.id, "inserted event");
        Event::try_from(row)
    }

    #[instrument(skip(self))]
    async fn find(&mut self, id: Uuid) -> StoreResult<Option<Event>> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| database("get event", e))?
        .map(Event::try_from)
        .transpose()
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn update(&mut self, event: &Event) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE events SET
                title = $2,
                description = $3,
                starts_at = $4,
                starts_at_offset = $5,
                ends_at = $6,
                ends_at_offset = $7,
                recurrent = $8,
                frequency = $9,
                repeat_until = $10,
                repeat_until_offset = $11,
                parent_id = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(utc(&event.starts_at))
        .bind(offset_of(&event.starts_at))
        .bind(utc(&event.ends_at))
        .bind(offset_of(&event.ends_at))
        .bind(event.recurrent)
        .bind(event.frequency.map(|f| f.as_str()))
        .bind(event.repeat_until.as_ref().map(utc))
        .bind(event.repeat_until.as_ref().map(offset_of))
        .bind(event.parent_id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| database("update event", e))?
        .ok_or(StoreError::NotFound(event.id))?;

        Event::try_from(row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_many(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM events WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.conn()?)
            .await
            .map_err(|e| database("delete events", e))?;

        debug!(deleted = result.rows_affected(), "deleted events");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn children(
        &mut self,
        parent_id: Uuid,
        starting_from: Option<DateTime<FixedOffset>>,
    ) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE parent_id = $1
              AND ($2::timestamptz IS NULL OR starts_at >= $2)
            ORDER BY starts_at, id
            "#
        ))
        .bind(parent_id)
        .bind(starting_from.as_ref().map(utc))
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| database("list children", e))?;

        Self::into_events(rows)
    }

    #[instrument(skip(self))]
    async fn has_children(&mut self, id: Uuid) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| database("check children", e))
    }

    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    async fn any_overlapping(
        &mut self,
        window: &OccurrenceWindow,
        exclude: &[Uuid],
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM events
                WHERE starts_at <= $2
                  AND ends_at >= $1
                  AND NOT (id = ANY($3))
            )
            "#,
        )
        .bind(utc(&window.starts_at))
        .bind(utc(&window.ends_at))
        .bind(exclude)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| database("check overlap", e))
    }

    #[instrument(skip(self))]
    async fn list(&mut self, query: &EventQuery) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE ($1::timestamptz IS NULL OR starts_at >= $1)
              AND ($2::timestamptz IS NULL OR starts_at <= $2)
            ORDER BY starts_at, id
            "#
        ))
        .bind(query.starts_after.as_ref().map(utc))
        .bind(query.ends_before.as_ref().map(utc))
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| database("list events", e))?;

        Self::into_events(rows)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::Closed)?;
        tx.commit()
            .await
            .map_err(|e| database("commit transaction", e))
    }
}
