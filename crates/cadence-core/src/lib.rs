// Cadence Core - recurring event series
//
// This crate holds the DB-agnostic parts of Cadence:
// - Event: the calendar entity and its recurrence fields
// - occurrence: expansion of a schedule into occurrence windows
// - overlap: conflict checks against the stored timeline
// - series: the lifecycle coordinator keeping parent/child series consistent
// - store: the EventStore / EventTransaction seam implemented by backends
// - memory: in-memory store for tests and dev mode

pub mod error;
pub mod event;
pub mod memory;
pub mod occurrence;
pub mod overlap;
pub mod series;
pub mod store;

pub use error::{Error, Result, ValidationErrors, OVERLAP_MESSAGE};
pub use event::{
    Event, EventDraft, Frequency, NewEvent, OccurrenceWindow, Recurrence, Schedule,
    UnknownFrequency,
};
pub use memory::InMemoryEventStore;
pub use series::{SeriesCoordinator, UpdateTransition};
pub use store::{EventQuery, EventStore, EventTransaction, StoreError, StoreResult};
