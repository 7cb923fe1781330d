pub mod decoder;
pub mod indexer;

pub use decoder::{ContractClass, ContractRegistry};
pub use indexer::{indexer_status, IndexerStatus, IndexerWorker, TickOutcome};
