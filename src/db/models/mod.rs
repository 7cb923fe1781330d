mod checkpoint;
mod event;

pub use checkpoint::Checkpoint;
pub use event::{Event, EventFilter, EventKind};
