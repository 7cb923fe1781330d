use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indexer sync progress checkpoint.
///
/// Tracks the last block whose events were durably stored. Used to resume
/// indexing after restarts without missing or duplicating events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_processed_block: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(last_processed_block: u64) -> Self {
        Self {
            last_processed_block,
            updated_at: Utc::now(),
        }
    }
}
