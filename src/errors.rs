use thiserror::Error;

/// Error taxonomy for the indexer.
///
/// `RpcUnavailable` and `RangeTooLarge` are transient and handled by the
/// polling loop (retry, batch shrink). The rest indicate a bug, bad input or
/// a corrupted store and propagate to the caller.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("chain node unavailable: {0}")]
    RpcUnavailable(String),

    #[error("log range {from}..={to} rejected by node")]
    RangeTooLarge { from: u64, to: u64 },

    #[error("checkpoint regression: current {current}, requested {requested}")]
    NonMonotonic { current: u64, requested: u64 },

    #[error("data integrity fault: {0}")]
    DataIntegrityFault(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
