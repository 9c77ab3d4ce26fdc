// Overlap validation
//
// Decision: the conflict predicate is boundary-inclusive (touching windows
// conflict); stores implement it in `EventTransaction::any_overlapping`.

use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::{Event, OccurrenceWindow};
use crate::store::EventTransaction;

/// Whether `window` conflicts with any stored event outside `exclude`
pub async fn has_conflict(
    tx: &mut dyn EventTransaction,
    window: &OccurrenceWindow,
    exclude: &[Uuid],
) -> Result<bool> {
    Ok(tx.any_overlapping(window, exclude).await?)
}

/// Whether any two consecutive windows of one series conflict.
///
/// Windows come ordered by start with one shared duration, so a clash always
/// shows up between neighbours.
pub fn overlaps_itself(windows: &[OccurrenceWindow]) -> bool {
    windows
        .windows(2)
        .any(|pair| pair[0].conflicts_with(pair[1].starts_at, pair[1].ends_at))
}

/// Check every window in order, failing on the first conflict.
///
/// The windows are checked against each other before the store is queried.
pub async fn ensure_free(
    tx: &mut dyn EventTransaction,
    windows: &[OccurrenceWindow],
    exclude: &[Uuid],
) -> Result<()> {
    if overlaps_itself(windows) {
        warn!(windows = windows.len(), "Rejected series overlapping itself");
        return Err(Error::Overlap);
    }

    for window in windows {
        if has_conflict(tx, window, exclude).await? {
            warn!(
                starts_at = %window.starts_at,
                ends_at = %window.ends_at,
                "Rejected overlapping event window"
            );
            return Err(Error::Overlap);
        }
    }
    Ok(())
}

/// Ids that may not count as conflicts while re-validating `event`.
///
/// A parent excludes itself and its children. A child excludes the siblings
/// starting at or after its stored start, itself included. Anything else
/// excludes only itself.
pub async fn exclusions_for(tx: &mut dyn EventTransaction, event: &Event) -> Result<Vec<Uuid>> {
    let children = tx.children(event.id, None).await?;
    if !children.is_empty() {
        let mut ids = Vec::with_capacity(children.len() + 1);
        ids.push(event.id);
        ids.extend(children.iter().map(|child| child.id));
        return Ok(ids);
    }

    if let Some(parent_id) = event.parent_id {
        let mut ids: Vec<Uuid> = tx
            .children(parent_id, Some(event.starts_at))
            .await?
            .into_iter()
            .map(|sibling| sibling.id)
            .collect();
        if !ids.contains(&event.id) {
            ids.push(event.id);
        }
        return Ok(ids);
    }

    Ok(vec![event.id])
}
