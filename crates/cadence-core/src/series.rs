// Series lifecycle coordination
//
// Decision: a series is one parent plus flat children; children are never
// expanded into series of their own.
// Decision: reactions are explicit calls made after a write, with the
// previous and current values passed in. `trigger_reactions = false` is a
// quiet write that stops there.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::{Event, EventDraft, NewEvent};
use crate::occurrence;
use crate::store::EventTransaction;

/// What an update does to the series around the updated event.
///
/// Exactly one transition applies per update, chosen in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTransition {
    /// Parent edited without toggling recurrence: drop and rebuild children
    RegenerateSeries,
    /// Child moved in time: it leaves the parent and starts a new series,
    /// replacing its later siblings
    SplitFromParent {
        parent_id: Uuid,
        original_starts_at: DateTime<FixedOffset>,
    },
    /// Recurrence switched on: materialize children
    Promote,
    /// Recurrence switched off on a parent: drop its children
    DemoteParent,
    /// Recurrence switched off on a child: detach and drop the old series
    DemoteChild { parent_id: Uuid },
    /// Nothing to propagate
    Unchanged,
}

impl UpdateTransition {
    /// Derive the transition from the stored fields before and after the edit
    pub fn classify(previous: &Event, current: &Event, has_children: bool) -> Self {
        let toggled = previous.recurrent != current.recurrent;
        let start_changed = previous.starts_at != current.starts_at;

        match (has_children, current.parent_id, toggled) {
            (true, _, false) => UpdateTransition::RegenerateSeries,
            (false, Some(parent_id), _) if start_changed => UpdateTransition::SplitFromParent {
                parent_id,
                original_starts_at: previous.starts_at,
            },
            (_, _, true) if current.recurrent => UpdateTransition::Promote,
            (true, _, true) => UpdateTransition::DemoteParent,
            (false, Some(parent_id), true) => UpdateTransition::DemoteChild { parent_id },
            _ => UpdateTransition::Unchanged,
        }
    }
}

/// Keeps series consistent as their members are created, updated and deleted
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesCoordinator;

impl SeriesCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Insert a draft as a new top-level event and materialize its series
    pub async fn create(&self, tx: &mut dyn EventTransaction, draft: EventDraft) -> Result<Event> {
        let event = tx.insert(NewEvent::standalone(draft)).await?;
        self.on_created(tx, &event).await?;
        Ok(event)
    }

    /// Persist `next` over `previous`, reacting to the change unless quiet
    pub async fn save(
        &self,
        tx: &mut dyn EventTransaction,
        previous: &Event,
        next: Event,
        trigger_reactions: bool,
    ) -> Result<Event> {
        let saved = tx.update(&next).await.map_err(Error::from_store)?;
        if !trigger_reactions {
            return Ok(saved);
        }

        self.on_updated(tx, previous, &saved).await?;
        tx.find(saved.id).await?.ok_or(Error::NotFound(saved.id))
    }

    /// Remove `event`, cascading through its series unless quiet
    pub async fn delete(
        &self,
        tx: &mut dyn EventTransaction,
        event: &Event,
        trigger_reactions: bool,
    ) -> Result<()> {
        if trigger_reactions {
            self.on_deleting(tx, event).await?;
        }
        tx.delete_many(&[event.id]).await?;
        Ok(())
    }

    /// Materialize every occurrence after the first as a child of `event`.
    /// Children never spawn series of their own.
    pub async fn on_created(
        &self,
        tx: &mut dyn EventTransaction,
        event: &Event,
    ) -> Result<Vec<Event>> {
        if event.is_child() {
            return Ok(Vec::new());
        }

        let windows = occurrence::expand(event);
        let mut children = Vec::with_capacity(windows.len().saturating_sub(1));
        for window in windows.into_iter().skip(1) {
            children.push(tx.insert(event.child_at(window)).await?);
        }

        if !children.is_empty() {
            info!(
                event_id = %event.id,
                children = children.len(),
                "Materialized series"
            );
        }
        Ok(children)
    }

    /// React to an update already written to the store
    pub async fn on_updated(
        &self,
        tx: &mut dyn EventTransaction,
        previous: &Event,
        current: &Event,
    ) -> Result<UpdateTransition> {
        let has_children = tx.has_children(current.id).await?;
        let transition = UpdateTransition::classify(previous, current, has_children);
        debug!(event_id = %current.id, ?transition, "Series update");

        match transition {
            UpdateTransition::RegenerateSeries => {
                self.drop_children(tx, current.id).await?;
                self.on_created(tx, current).await?;
            }
            UpdateTransition::SplitFromParent {
                parent_id,
                original_starts_at,
            } => {
                let superseded: Vec<Uuid> = tx
                    .children(parent_id, Some(original_starts_at))
                    .await?
                    .into_iter()
                    .map(|sibling| sibling.id)
                    .filter(|id| *id != current.id)
                    .collect();

                let detached = Self::detach(tx, current).await?;
                self.on_created(tx, &detached).await?;
                tx.delete_many(&superseded).await?;

                info!(
                    event_id = %current.id,
                    %parent_id,
                    superseded = superseded.len(),
                    "Split occurrence into a new series"
                );
            }
            UpdateTransition::Promote => {
                self.on_created(tx, current).await?;
            }
            UpdateTransition::DemoteParent => {
                self.drop_children(tx, current.id).await?;
            }
            UpdateTransition::DemoteChild { parent_id } => {
                Self::detach(tx, current).await?;
                if let Some(parent) = tx.find(parent_id).await? {
                    self.delete(tx, &parent, true).await?;
                }
                info!(event_id = %current.id, %parent_id, "Demoted occurrence to standalone event");
            }
            UpdateTransition::Unchanged => {}
        }

        Ok(transition)
    }

    /// Cascade a pending delete through the series of `event`.
    ///
    /// A parent takes all its children along. A child takes itself and every
    /// later sibling, leaving the parent and earlier siblings intact.
    pub async fn on_deleting(&self, tx: &mut dyn EventTransaction, event: &Event) -> Result<()> {
        let children = tx.children(event.id, None).await?;
        if !children.is_empty() {
            let ids: Vec<Uuid> = children.iter().map(|child| child.id).collect();
            tx.delete_many(&ids).await?;
            debug!(event_id = %event.id, removed = ids.len(), "Deleted series children");
            return Ok(());
        }

        if let Some(parent_id) = event.parent_id {
            let ids: Vec<Uuid> = tx
                .children(parent_id, Some(event.starts_at))
                .await?
                .into_iter()
                .map(|sibling| sibling.id)
                .collect();
            tx.delete_many(&ids).await?;
            debug!(
                event_id = %event.id,
                %parent_id,
                removed = ids.len(),
                "Deleted occurrence and later siblings"
            );
        }
        Ok(())
    }

    async fn drop_children(&self, tx: &mut dyn EventTransaction, parent_id: Uuid) -> Result<()> {
        let ids: Vec<Uuid> = tx
            .children(parent_id, None)
            .await?
            .into_iter()
            .map(|child| child.id)
            .collect();
        if !ids.is_empty() {
            tx.delete_many(&ids).await?;
            debug!(%parent_id, removed = ids.len(), "Dropped series children");
        }
        Ok(())
    }

    /// Quiet write clearing the parent link
    async fn detach(tx: &mut dyn EventTransaction, event: &Event) -> Result<Event> {
        let detached = Event {
            parent_id: None,
            ..event.clone()
        };
        tx.update(&detached).await.map_err(Error::from_store)
    }
}
