use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Derived per-market aggregate state. Sole writer is the projector fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub address: String,
    pub underlying: String,
    pub symbol: String,
    pub listed: bool,
    pub total_supply: U256,
    pub total_borrow: U256,
    pub reserves: U256,
    pub borrow_index: U256,
    pub collateral_factor_mantissa: U256,
    /// USD price of the underlying asset, 1e18 mantissa. `None` until the
    /// comptroller posts a price.
    pub price_mantissa: Option<U256>,
}

impl MarketState {
    pub fn new(address: String) -> Self {
        Self {
            address,
            underlying: String::new(),
            symbol: String::new(),
            listed: false,
            total_supply: U256::ZERO,
            total_borrow: U256::ZERO,
            reserves: U256::ZERO,
            borrow_index: U256::from(10u64).pow(U256::from(18u64)),
            collateral_factor_mantissa: U256::ZERO,
            price_mantissa: None,
        }
    }
}

/// Derived `(account, market)` position. Balances never go negative; a fold
/// that would underflow raises a data-integrity fault instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub account: String,
    pub market: String,
    pub supply_underlying: U256,
    pub borrow_balance: U256,
}

impl AccountPosition {
    pub fn new(account: String, market: String) -> Self {
        Self {
            account,
            market,
            supply_underlying: U256::ZERO,
            borrow_balance: U256::ZERO,
        }
    }
}

/// Derived liquidity-mining pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPool {
    pub pool_id: u64,
    pub staked_asset: String,
    pub reward_asset: String,
    pub total_staked: U256,
    pub reward_rate_per_second: U256,
}

/// Derived per-account stake in a liquidity-mining pool.
///
/// `accrued_reward` is monotonically non-decreasing between stake-amount
/// changes; it only decreases when a claim is folded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub account: String,
    pub pool_id: u64,
    pub staked_amount: U256,
    pub accrued_reward: U256,
    pub last_update_timestamp: u64,
}

/// Full projected state: the deterministic fold of the ordered event log up
/// to `folded_to_block`. Replaying the same event sequence yields an
/// identical snapshot; all maps are ordered so serialization is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub markets: BTreeMap<String, MarketState>,
    /// account -> market -> position
    pub positions: BTreeMap<String, BTreeMap<String, AccountPosition>>,
    pub pools: BTreeMap<u64, MiningPool>,
    /// pool id -> account -> stake
    pub stakes: BTreeMap<u64, BTreeMap<String, StakePosition>>,
    /// underlying asset -> posted USD price mantissa; bridges prices posted
    /// before the market listing event arrives
    pub prices: BTreeMap<String, U256>,
    pub folded_to_block: Option<u64>,
    pub last_event_timestamp: u64,
}
