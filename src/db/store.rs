use std::path::Path;

use log::debug;
use sled::Tree;

use crate::{
    db::models::{Checkpoint, Event, EventFilter},
    errors::IndexerError,
};

const EVENTS_TREE: &str = "events";
const EVENT_IDS_TREE: &str = "event_ids";
const META_TREE: &str = "meta";
const CHECKPOINT_KEY: &[u8] = b"last_processed_block";

/// Durable append-only event store with a single checkpoint record.
///
/// Two trees hold the events: `events` is ordered by
/// `(block_number, log_index)` for range queries, `event_ids` is keyed by
/// `(tx_hash, log_index)` and guarantees idempotent insertion. The `meta`
/// tree holds the checkpoint.
///
/// A crash between event persistence and checkpoint advance is safe to
/// retry: re-inserting an already-stored event is a no-op, so re-processing
/// the same block range converges to the same state.
pub struct EventStore {
    db: sled::Db,
    events: Tree,
    event_ids: Tree,
    meta: Tree,
}

impl EventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store backed by a temporary sled database. Used by tests.
    pub fn open_temporary() -> Result<Self, IndexerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, IndexerError> {
        let events = db.open_tree(EVENTS_TREE)?;
        let event_ids = db.open_tree(EVENT_IDS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self {
            db,
            events,
            event_ids,
            meta,
        })
    }

    /// Ordered key: big-endian `(block_number, log_index)` so a plain tree
    /// scan yields events in canonical fold order.
    fn ordered_key(event: &Event) -> [u8; 12] {
        let mut key = [0u8; 12];
        key[..8].copy_from_slice(&event.block_number.to_be_bytes());
        key[8..].copy_from_slice(&event.log_index.to_be_bytes());
        key
    }

    /// Identity key: `(tx_hash, log_index)`.
    fn identity_key(tx_hash: &str, log_index: u32) -> Vec<u8> {
        let mut key = Vec::with_capacity(tx_hash.len() + 4);
        key.extend_from_slice(tx_hash.as_bytes());
        key.extend_from_slice(&log_index.to_be_bytes());
        key
    }

    /// Insert a batch of decoded events, skipping any whose
    /// `(tx_hash, log_index)` identity is already stored. Returns the number
    /// of newly inserted events. Flushes before returning so the caller may
    /// advance the checkpoint afterwards.
    pub fn insert(&self, events: &[Event]) -> Result<usize, IndexerError> {
        let mut inserted = 0usize;
        for event in events {
            let id_key = Self::identity_key(&event.tx_hash, event.log_index);
            if self.event_ids.contains_key(&id_key)? {
                continue;
            }
            let ordered_key = Self::ordered_key(event);
            let value = serde_json::to_vec(event)?;
            self.events.insert(ordered_key, value)?;
            self.event_ids.insert(id_key, &ordered_key[..])?;
            inserted += 1;
        }
        if inserted > 0 {
            self.db.flush()?;
        }
        debug!("stored {} new events ({} offered)", inserted, events.len());
        Ok(inserted)
    }

    /// Last fully processed block, if any batch has completed yet.
    pub fn checkpoint(&self) -> Result<Option<u64>, IndexerError> {
        match self.meta.get(CHECKPOINT_KEY)? {
            Some(raw) => {
                let checkpoint: Checkpoint = serde_json::from_slice(&raw)?;
                Ok(Some(checkpoint.last_processed_block))
            },
            None => Ok(None),
        }
    }

    /// Advance the checkpoint. Must only be called after the events of the
    /// processed range are durably stored. Rejects regression with
    /// [`IndexerError::NonMonotonic`]; re-setting the current value is a
    /// no-op heartbeat.
    pub fn set_checkpoint(&self, block: u64) -> Result<(), IndexerError> {
        if let Some(current) = self.checkpoint()? {
            if block < current {
                return Err(IndexerError::NonMonotonic {
                    current,
                    requested: block,
                });
            }
        }
        let checkpoint = Checkpoint::new(block);
        self.meta
            .insert(CHECKPOINT_KEY, serde_json::to_vec(&checkpoint)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// Query stored events ordered by `(block_number, log_index)` ascending.
    pub fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, IndexerError> {
        let limit = filter.limit.unwrap_or(EventFilter::DEFAULT_LIMIT);
        let mut start = [0u8; 12];
        if let Some(from) = filter.from_block {
            start[..8].copy_from_slice(&from.to_be_bytes());
        }

        let mut results = Vec::new();
        for entry in self.events.range(start.to_vec()..) {
            let (key, value) = entry?;
            if let Some(to) = filter.to_block {
                let mut block_bytes = [0u8; 8];
                block_bytes.copy_from_slice(&key[..8]);
                if u64::from_be_bytes(block_bytes) > to {
                    break;
                }
            }
            let event: Event = serde_json::from_slice(&value)?;
            if filter.matches(&event) {
                results.push(event);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// All events in `from..=to` block range in fold order, without a result
    /// limit. Used by the projector.
    pub fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<Event>, IndexerError> {
        self.query(&EventFilter {
            from_block: Some(from),
            to_block: Some(to),
            limit: Some(usize::MAX),
            ..Default::default()
        })
    }

    pub fn flush(&self) -> Result<(), IndexerError> {
        self.db.flush()?;
        Ok(())
    }
}
