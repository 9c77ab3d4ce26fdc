// Occurrence expansion
//
// Decision: occurrence k is computed from the anchor as `anchor + k * unit`
// rather than by stepping from the previous occurrence, so a Jan 31 monthly
// series visits Feb 29 and then Mar 31 instead of drifting to the 29th.
// Decision: every occurrence keeps the anchor's duration; only the start is
// stepped through the calendar.

use crate::event::{OccurrenceWindow, Schedule};

/// Every window a series occupies, ordered by start.
///
/// The first window is the schedule's own `(starts_at, ends_at)`; the rest are
/// the child occurrences to materialize. Non-recurrent schedules yield nothing.
/// Expansion stops at the first start past `repeat_until` (a start equal to it
/// is kept) or when calendar arithmetic overflows.
pub fn expand(schedule: &impl Schedule) -> Vec<OccurrenceWindow> {
    let Some(recurrence) = schedule.recurrence() else {
        return Vec::new();
    };
    let anchor = schedule.window();
    let duration = anchor.ends_at - anchor.starts_at;

    let mut windows = Vec::new();
    for step in 0u32.. {
        let Some(starts_at) = recurrence.frequency.advance(anchor.starts_at, step) else {
            break;
        };
        if starts_at > recurrence.repeat_until {
            break;
        }
        let Some(ends_at) = starts_at.checked_add_signed(duration) else {
            break;
        };
        windows.push(OccurrenceWindow::new(starts_at, ends_at));
    }
    windows
}

/// Occurrence count without materializing the windows beyond `limit`.
///
/// Returns `None` once the series would exceed `limit` windows.
pub fn count_within(schedule: &impl Schedule, limit: usize) -> Option<usize> {
    let Some(recurrence) = schedule.recurrence() else {
        return Some(1);
    };
    let anchor = schedule.window();

    let mut count = 0usize;
    for step in 0u32.. {
        match recurrence.frequency.advance(anchor.starts_at, step) {
            Some(starts_at) if starts_at <= recurrence.repeat_until => {
                count += 1;
                if count > limit {
                    return None;
                }
            }
            _ => break,
        }
    }
    Some(count)
}
