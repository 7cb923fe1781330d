mod config;

pub use config::{
    ContractSettings, IndexerSettings, RatesSettings, Settings, StorageSettings,
};
