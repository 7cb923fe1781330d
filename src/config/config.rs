use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::accounting::InterestRateModel;

/// Chain polling configuration.
///
/// The indexer polls a single JSON-RPC endpoint, fetching logs in batches of
/// at most `batch_size` blocks. On a fresh store the first cycle starts
/// `initial_lookback` blocks behind the chain tip.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexerSettings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_initial_lookback")]
    pub initial_lookback: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval_seconds: default_poll_interval_seconds(),
            batch_size: default_batch_size(),
            initial_lookback: default_initial_lookback(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_batch_size() -> u64 {
    1_000
}

fn default_initial_lookback() -> u64 {
    2_000
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Embedded event store location.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "lendex.db".to_string()
}

/// Watched protocol contract addresses. The address set is static for the
/// lifetime of the process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContractSettings {
    #[serde(default)]
    pub comptroller: Option<String>,
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub liquidity_mining: Vec<String>,
}

/// Jump-rate curve parameters for APR computation, annualized fractions.
#[derive(Debug, Deserialize, Clone)]
pub struct RatesSettings {
    #[serde(default = "default_base_rate")]
    pub base_rate: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jump_multiplier")]
    pub jump_multiplier: f64,
    #[serde(default = "default_kink")]
    pub kink: f64,
    #[serde(default = "default_reserve_factor")]
    pub reserve_factor: f64,
}

impl Default for RatesSettings {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
            multiplier: default_multiplier(),
            jump_multiplier: default_jump_multiplier(),
            kink: default_kink(),
            reserve_factor: default_reserve_factor(),
        }
    }
}

impl From<&RatesSettings> for InterestRateModel {
    fn from(rates: &RatesSettings) -> Self {
        Self {
            base_rate: rates.base_rate,
            multiplier: rates.multiplier,
            jump_multiplier: rates.jump_multiplier,
            kink: rates.kink,
            reserve_factor: rates.reserve_factor,
        }
    }
}

fn default_base_rate() -> f64 {
    0.02
}

fn default_multiplier() -> f64 {
    0.1
}

fn default_jump_multiplier() -> f64 {
    3.0
}

fn default_kink() -> f64 {
    0.8
}

fn default_reserve_factor() -> f64 {
    0.1
}

/// Root application configuration.
///
/// Loaded from `config.yaml` when present, overridable through `LENDEX__*`
/// environment variables (e.g. `LENDEX__INDEXER__RPC_URL`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub indexer: IndexerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub contracts: ContractSettings,
    #[serde(default)]
    pub rates: RatesSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("LENDEX").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
