//! EventStore / EventTransaction trait definitions
//
// Decision: every request runs inside one unit of work so check-then-write
// and series cascades commit or vanish together.
// Decision: store writes never fire lifecycle reactions; the series
// coordinator decides when reactions run.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::event::{Event, NewEvent, OccurrenceWindow};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Event not found
    #[error("event not found: {0}")]
    NotFound(Uuid),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Unit of work already committed
    #[error("transaction already closed")]
    Closed,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Time-range filter for listing events. Both bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Keep events with `starts_at >= starts_after`
    pub starts_after: Option<DateTime<FixedOffset>>,
    /// Keep events with `starts_at <= ends_before`, so events still running at
    /// that time are listed
    pub ends_before: Option<DateTime<FixedOffset>>,
}

impl EventQuery {
    pub fn matches(&self, event: &Event) -> bool {
        self.starts_after.map_or(true, |after| event.starts_at >= after)
            && self.ends_before.map_or(true, |before| event.starts_at <= before)
    }
}

/// Entry point to event persistence
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Open a unit of work. Units are mutually exclusive until commit or drop.
    async fn begin(&self) -> StoreResult<Box<dyn EventTransaction>>;
}

/// A single unit of work against the event table.
///
/// Dropping without [`EventTransaction::commit`] discards every write.
#[async_trait]
pub trait EventTransaction: Send {
    async fn insert(&mut self, event: NewEvent) -> StoreResult<Event>;

    async fn find(&mut self, id: Uuid) -> StoreResult<Option<Event>>;

    /// Persist every mutable field of `event` and refresh `updated_at`
    async fn update(&mut self, event: &Event) -> StoreResult<Event>;

    /// Remove the given ids, returning how many rows went away
    async fn delete_many(&mut self, ids: &[Uuid]) -> StoreResult<u64>;

    /// Children of `parent_id` ordered by `starts_at`, optionally only those
    /// starting at or after `starting_from`
    async fn children(
        &mut self,
        parent_id: Uuid,
        starting_from: Option<DateTime<FixedOffset>>,
    ) -> StoreResult<Vec<Event>>;

    async fn has_children(&mut self, id: Uuid) -> StoreResult<bool>;

    /// Whether any event outside `exclude` touches or intersects `window`
    async fn any_overlapping(
        &mut self,
        window: &OccurrenceWindow,
        exclude: &[Uuid],
    ) -> StoreResult<bool>;

    /// Events matching `query`, ordered by `starts_at`
    async fn list(&mut self, query: &EventQuery) -> StoreResult<Vec<Event>>;

    async fn commit(&mut self) -> StoreResult<()>;
}
