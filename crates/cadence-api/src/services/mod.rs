// Services layer for business logic
// Services own the write path, calling the store and series coordinator directly

pub mod event;

pub use event::{EventService, EventWithChildren};
