pub mod abis;
pub mod accounting;
pub mod chain;
pub mod config;
pub mod db;
pub mod errors;
pub mod projector;
pub mod utils;
pub mod worker;

pub use chain::{ChainClient, RpcChainClient};
pub use config::Settings;
pub use db::EventStore;
pub use errors::IndexerError;
pub use projector::Projector;
pub use worker::{ContractRegistry, IndexerWorker};
