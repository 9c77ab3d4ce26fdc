// Database models (internal, may differ from public DTOs)

use cadence_core::{Event, Frequency, StoreError};
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Column list matching [`EventRow`]
pub const EVENT_COLUMNS: &str = "id, title, description, starts_at, starts_at_offset, \
    ends_at, ends_at_offset, recurrent, frequency, repeat_until, repeat_until_offset, \
    parent_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub starts_at_offset: i32,
    pub ends_at: DateTime<Utc>,
    pub ends_at_offset: i32,
    pub recurrent: bool,
    pub frequency: Option<String>,
    pub repeat_until: Option<DateTime<Utc>>,
    pub repeat_until_offset: Option<i32>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seconds east of UTC for binding into an `*_offset` column
pub fn offset_of(value: &DateTime<FixedOffset>) -> i32 {
    value.offset().local_minus_utc()
}

fn localize(
    id: Uuid,
    value: DateTime<Utc>,
    offset: i32,
) -> Result<DateTime<FixedOffset>, StoreError> {
    let offset = FixedOffset::east_opt(offset).ok_or_else(|| {
        StoreError::Database(format!("event {id}: invalid utc offset {offset}"))
    })?;
    Ok(value.with_timezone(&offset))
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let frequency = row
            .frequency
            .as_deref()
            .map(str::parse::<Frequency>)
            .transpose()
            .map_err(|e| StoreError::Database(format!("event {}: {e}", row.id)))?;
        let repeat_until = row
            .repeat_until
            .map(|value| localize(row.id, value, row.repeat_until_offset.unwrap_or(0)))
            .transpose()?;

        Ok(Event {
            id: row.id,
            starts_at: localize(row.id, row.starts_at, row.starts_at_offset)?,
            ends_at: localize(row.id, row.ends_at, row.ends_at_offset)?,
            title: row.title,
            description: row.description,
            recurrent: row.recurrent,
            frequency,
            repeat_until,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
