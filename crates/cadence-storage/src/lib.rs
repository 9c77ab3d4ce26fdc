// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - PgEventStore: implements EventStore for event persistence
// - StorageBackend: PostgreSQL or in-memory, picked at startup

pub mod backend;
pub mod models;
pub mod postgres;

pub use backend::StorageBackend;
pub use models::{EventRow, EVENT_COLUMNS};
pub use postgres::{PgEventStore, PgEventTransaction};
