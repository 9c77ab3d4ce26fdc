// In-memory event store for tests and dev mode
// Decision: one tokio mutex guards the whole table; a unit of work holds the
// owned guard and edits a working copy that replaces the table on commit
// Decision: deleting a parent removes its children, matching the
// ON DELETE CASCADE foreign key of the postgres schema
//
// All data is stored in memory and lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::event::{Event, NewEvent, OccurrenceWindow};
use crate::store::{EventQuery, EventStore, EventTransaction, StoreError, StoreResult};

type Table = HashMap<Uuid, Event>;

/// In-memory implementation of [`EventStore`]
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    table: Arc<Mutex<Table>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn begin(&self) -> StoreResult<Box<dyn EventTransaction>> {
        let guard = self.table.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }
}

struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<Table>>,
    working: Table,
}

impl InMemoryTransaction {
    fn table(&mut self) -> StoreResult<&mut Table> {
        if self.guard.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(&mut self.working)
    }

    fn sorted(mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        events
    }
}

#[async_trait]
impl EventTransaction for InMemoryTransaction {
    async fn insert(&mut self, event: NewEvent) -> StoreResult<Event> {
        let table = self.table()?;
        if let Some(parent_id) = event.parent_id {
            if !table.contains_key(&parent_id) {
                return Err(StoreError::NotFound(parent_id));
            }
        }

        let now = Utc::now();
        let draft = event.draft;
        let row = Event {
            id: Uuid::now_v7(),
            title: draft.title,
            description: draft.description,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            recurrent: draft.recurrent,
            frequency: draft.frequency,
            repeat_until: draft.repeat_until,
            parent_id: event.parent_id,
            created_at: now,
            updated_at: now,
        };
        table.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find(&mut self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.table()?.get(&id).cloned())
    }

    async fn update(&mut self, event: &Event) -> StoreResult<Event> {
        let table = self.table()?;
        let stored = table
            .get_mut(&event.id)
            .ok_or(StoreError::NotFound(event.id))?;
        *stored = Event {
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..event.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_many(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let table = self.table()?;
        let mut deleted = 0u64;
        for id in ids {
            if table.remove(id).is_some() {
                deleted += 1;
            }
        }
        table.retain(|_, event| event.parent_id.map_or(true, |parent| !ids.contains(&parent)));
        Ok(deleted)
    }

    async fn children(
        &mut self,
        parent_id: Uuid,
        starting_from: Option<DateTime<FixedOffset>>,
    ) -> StoreResult<Vec<Event>> {
        let children = self
            .table()?
            .values()
            .filter(|event| event.parent_id == Some(parent_id))
            .filter(|event| starting_from.map_or(true, |from| event.starts_at >= from))
            .cloned()
            .collect();
        Ok(Self::sorted(children))
    }

    async fn has_children(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self
            .table()?
            .values()
            .any(|event| event.parent_id == Some(id)))
    }

    async fn any_overlapping(
        &mut self,
        window: &OccurrenceWindow,
        exclude: &[Uuid],
    ) -> StoreResult<bool> {
        Ok(self.table()?.values().any(|event| {
            !exclude.contains(&event.id) && window.conflicts_with(event.starts_at, event.ends_at)
        }))
    }

    async fn list(&mut self, query: &EventQuery) -> StoreResult<Vec<Event>> {
        let events = self
            .table()?
            .values()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        Ok(Self::sorted(events))
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::Closed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
