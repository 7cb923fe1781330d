//! Durable storage for decoded events and the sync checkpoint.
//!
//! Backed by an embedded sled database: an append-only events table keyed by
//! `(tx_hash, log_index)` with an ordered `(block_number, log_index)` index,
//! plus a single checkpoint record.

pub mod models;
mod store;

pub use models::{Checkpoint, Event, EventFilter, EventKind};
pub use store::EventStore;
