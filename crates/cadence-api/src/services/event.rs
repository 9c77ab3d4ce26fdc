// Event service for business logic
//
// Every write runs in one unit of work: validation against the stored
// timeline, the write itself and the series reactions commit together.
// Dropping the unit on any error leaves the store untouched.

use std::sync::Arc;

use cadence_core::{
    occurrence, overlap, Error, Event, EventDraft, EventQuery, EventStore, Result, Schedule,
    SeriesCoordinator,
};
use tracing::{info, instrument};
use uuid::Uuid;

/// An event with its series children, when they were requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWithChildren {
    pub event: Event,
    pub children: Option<Vec<Event>>,
}

pub struct EventService {
    store: Arc<dyn EventStore>,
    coordinator: SeriesCoordinator,
    max_series_occurrences: usize,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, max_series_occurrences: usize) -> Self {
        Self {
            store,
            coordinator: SeriesCoordinator::new(),
            max_series_occurrences,
        }
    }

    fn ensure_series_length(&self, draft: &EventDraft) -> Result<()> {
        match occurrence::count_within(draft, self.max_series_occurrences) {
            Some(_) => Ok(()),
            None => Err(Error::invalid(
                "repeat_until",
                format!(
                    "The repeat until field must not produce more than {} occurrences.",
                    self.max_series_occurrences
                ),
            )),
        }
    }

    /// Windows a draft will occupy: the whole series, or its single window
    fn windows(draft: &EventDraft) -> Vec<cadence_core::OccurrenceWindow> {
        let windows = occurrence::expand(draft);
        if windows.is_empty() {
            vec![draft.window()]
        } else {
            windows
        }
    }

    #[instrument(skip(self, draft), fields(title = %draft.title, recurrent = draft.recurrent))]
    pub async fn create(&self, draft: EventDraft) -> Result<Event> {
        self.ensure_series_length(&draft)?;

        let mut tx = self.store.begin().await?;
        overlap::ensure_free(tx.as_mut(), &Self::windows(&draft), &[]).await?;

        let event = self.coordinator.create(tx.as_mut(), draft).await?;
        tx.commit().await?;

        info!(event_id = %event.id, "Created event");
        Ok(event)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: Uuid, draft: EventDraft) -> Result<Event> {
        self.ensure_series_length(&draft)?;

        let mut tx = self.store.begin().await?;
        let previous = tx.find(id).await?.ok_or(Error::NotFound(id))?;

        let exclude = overlap::exclusions_for(tx.as_mut(), &previous).await?;
        overlap::ensure_free(tx.as_mut(), &Self::windows(&draft), &exclude).await?;

        let next = previous.apply(draft);
        let event = self
            .coordinator
            .save(tx.as_mut(), &previous, next, true)
            .await?;
        tx.commit().await?;

        info!(event_id = %event.id, "Updated event");
        Ok(event)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let event = tx.find(id).await?.ok_or(Error::NotFound(id))?;

        self.coordinator.delete(tx.as_mut(), &event, true).await?;
        tx.commit().await?;

        info!(event_id = %id, "Deleted event");
        Ok(())
    }

    pub async fn get(&self, id: Uuid, include_children: bool) -> Result<EventWithChildren> {
        let mut tx = self.store.begin().await?;
        let event = tx.find(id).await?.ok_or(Error::NotFound(id))?;
        let children = if include_children {
            Some(tx.children(id, None).await?)
        } else {
            None
        };
        Ok(EventWithChildren { event, children })
    }

    pub async fn list(
        &self,
        query: &EventQuery,
        include_children: bool,
    ) -> Result<Vec<EventWithChildren>> {
        let mut tx = self.store.begin().await?;
        let events = tx.list(query).await?;

        let mut result = Vec::with_capacity(events.len());
        for event in events {
            let children = if include_children {
                Some(tx.children(event.id, None).await?)
            } else {
                None
            };
            result.push(EventWithChildren { event, children });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Frequency, InMemoryEventStore};
    use chrono::{DateTime, Duration, FixedOffset};

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn service(max: usize) -> (EventService, InMemoryEventStore) {
        let store = InMemoryEventStore::new();
        (EventService::new(Arc::new(store.clone()), max), store)
    }

    fn daily(start: &str, end: &str, until: &str) -> EventDraft {
        EventDraft::new("Standup", ts(start), ts(end)).repeating(Frequency::Daily, ts(until))
    }

    #[tokio::test]
    async fn test_create_rejects_overlap_without_partial_writes() {
        let (service, store) = service(100);
        service
            .create(EventDraft::new(
                "Dentist",
                ts("2024-05-03T09:30:00Z"),
                ts("2024-05-03T09:45:00Z"),
            ))
            .await
            .unwrap();

        let result = service
            .create(daily(
                "2024-05-01T09:00:00Z",
                "2024-05-01T10:00:00Z",
                "2024-05-05T10:00:00Z",
            ))
            .await;

        assert!(matches!(result, Err(Error::Overlap)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_accepted_creates_never_overlap() {
        let (service, _) = service(100);
        let drafts = [
            (
                daily("2024-05-01T09:00:00Z", "2024-05-01T10:00:00Z", "2024-05-04T10:00:00Z"),
                true,
            ),
            (
                EventDraft::new("Lunch", ts("2024-05-02T12:00:00Z"), ts("2024-05-02T13:00:00Z")),
                true,
            ),
            (
                EventDraft::new("Clash", ts("2024-05-02T12:30:00Z"), ts("2024-05-02T13:30:00Z")),
                false,
            ),
            (
                EventDraft::new("Edge", ts("2024-05-03T08:00:00Z"), ts("2024-05-03T09:00:00Z")),
                false,
            ),
            (
                EventDraft::new("Gap", ts("2024-05-03T10:00:01Z"), ts("2024-05-03T11:00:00Z")),
                true,
            ),
        ];
        for (draft, accepted) in drafts {
            let title = draft.title.clone();
            let result = service.create(draft).await;
            if accepted {
                assert!(result.is_ok(), "{title} should be accepted: {result:?}");
            } else {
                assert!(matches!(result, Err(Error::Overlap)), "{title}: {result:?}");
            }
        }

        let events: Vec<Event> = service
            .list(&EventQuery::default(), false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events.len(), 6);
        for (i, a) in events.iter().enumerate() {
            for b in &events[i + 1..] {
                assert!(
                    !a.window().conflicts_with(b.starts_at, b.ends_at),
                    "{} overlaps {}",
                    a.title,
                    b.title
                );
            }
        }
    }

    #[tokio::test]
    async fn test_create_rejects_series_overlapping_itself() {
        let (service, store) = service(100);
        let result = service
            .create(daily(
                "2024-05-01T09:00:00Z",
                "2024-05-02T10:00:00Z",
                "2024-05-04T10:00:00Z",
            ))
            .await;

        assert!(matches!(result, Err(Error::Overlap)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_series() {
        let (service, store) = service(3);
        let result = service
            .create(daily(
                "2024-05-01T09:00:00Z",
                "2024-05-01T10:00:00Z",
                "2024-05-10T10:00:00Z",
            ))
            .await;

        match result {
            Err(Error::Validation(errors)) => assert!(errors.has("repeat_until")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_may_reuse_own_series_slots() {
        let (service, _) = service(100);
        let parent = service
            .create(daily(
                "2024-05-01T09:00:00Z",
                "2024-05-01T10:00:00Z",
                "2024-05-03T10:00:00Z",
            ))
            .await
            .unwrap();

        let shifted = daily(
            "2024-05-01T09:30:00Z",
            "2024-05-01T10:30:00Z",
            "2024-05-03T10:30:00Z",
        );
        let updated = service.update(parent.id, shifted).await.unwrap();
        assert_eq!(updated.starts_at, parent.starts_at + Duration::minutes(30));

        let view = service.get(parent.id, true).await.unwrap();
        let children = view.children.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].starts_at, ts("2024-05-02T09:30:00Z"));
    }

    #[tokio::test]
    async fn test_update_rejects_overlap_with_other_event() {
        let (service, _) = service(100);
        let first = service
            .create(EventDraft::new(
                "One",
                ts("2024-05-01T09:00:00Z"),
                ts("2024-05-01T10:00:00Z"),
            ))
            .await
            .unwrap();
        service
            .create(EventDraft::new(
                "Two",
                ts("2024-05-01T11:00:00Z"),
                ts("2024-05-01T12:00:00Z"),
            ))
            .await
            .unwrap();

        let result = service
            .update(
                first.id,
                EventDraft::new("One", ts("2024-05-01T10:30:00Z"), ts("2024-05-01T11:30:00Z")),
            )
            .await;
        assert!(matches!(result, Err(Error::Overlap)));
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let (service, _) = service(100);
        let id = Uuid::now_v7();

        assert!(matches!(service.get(id, false).await, Err(Error::NotFound(_))));
        assert!(matches!(service.delete(id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            service
                .update(
                    id,
                    EventDraft::new("x", ts("2024-05-01T09:00:00Z"), ts("2024-05-01T10:00:00Z"))
                )
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mid_series_edit_splits_series() {
        let (service, _) = service(100);
        let parent = service
            .create(daily(
                "2024-05-01T09:00:00Z",
                "2024-05-01T10:00:00Z",
                "2024-05-06T10:00:00Z",
            ))
            .await
            .unwrap();
        let children = service.get(parent.id, true).await.unwrap().children.unwrap();
        assert_eq!(children.len(), 5);
        let second = &children[1];

        let moved = service
            .update(
                second.id,
                daily(
                    "2024-05-03T09:30:00Z",
                    "2024-05-03T10:30:00Z",
                    "2024-05-06T10:00:00Z",
                ),
            )
            .await
            .unwrap();

        assert_eq!(moved.parent_id, None);
        let old_series = service.get(parent.id, true).await.unwrap();
        assert_eq!(old_series.event, parent);
        assert_eq!(old_series.children.unwrap(), vec![children[0].clone()]);

        let new_series = service.get(moved.id, true).await.unwrap().children.unwrap();
        assert_eq!(new_series.len(), 3);
        assert_eq!(new_series[0].starts_at, ts("2024-05-04T09:30:00Z"));
    }
}
