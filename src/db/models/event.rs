use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Decoded payload of a known protocol event.
///
/// Closed tagged-variant set: one variant per event signature the decoder
/// recognizes. Addresses are stored as lowercase 0x-prefixed hex strings,
/// amounts as raw U256 in underlying-token units, mantissas as 1e18
/// fixed-point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // Market token events
    Mint {
        minter: String,
        amount: U256,
    },
    Redeem {
        redeemer: String,
        amount: U256,
    },
    Borrow {
        borrower: String,
        amount: U256,
    },
    RepayBorrow {
        payer: String,
        borrower: String,
        amount: U256,
    },
    LiquidateBorrow {
        liquidator: String,
        borrower: String,
        repay_amount: U256,
        collateral_market: String,
        seize_amount: U256,
    },
    AccrueInterest {
        interest_accumulated: U256,
        borrow_index: U256,
        total_borrows: U256,
        total_reserves: U256,
    },
    Transfer {
        from: String,
        to: String,
        amount: U256,
    },

    // Comptroller events
    MarketListed {
        market: String,
        underlying: String,
        symbol: String,
    },
    NewCollateralFactor {
        market: String,
        factor_mantissa: U256,
    },
    PricePosted {
        asset: String,
        price_mantissa: U256,
    },

    // Liquidity mining events
    PoolCreated {
        pool_id: u64,
        staked_asset: String,
        reward_asset: String,
        rate_per_second: U256,
    },
    Staked {
        account: String,
        pool_id: u64,
        amount: U256,
    },
    Unstaked {
        account: String,
        pool_id: u64,
        amount: U256,
    },
    RewardClaimed {
        account: String,
        pool_id: u64,
        amount: U256,
    },
    RewardRateUpdated {
        pool_id: u64,
        rate_per_second: U256,
    },
}

impl EventKind {
    /// Event name as emitted by the contract, used for store filtering.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Mint { .. } => "Mint",
            EventKind::Redeem { .. } => "Redeem",
            EventKind::Borrow { .. } => "Borrow",
            EventKind::RepayBorrow { .. } => "RepayBorrow",
            EventKind::LiquidateBorrow { .. } => "LiquidateBorrow",
            EventKind::AccrueInterest { .. } => "AccrueInterest",
            EventKind::Transfer { .. } => "Transfer",
            EventKind::MarketListed { .. } => "MarketListed",
            EventKind::NewCollateralFactor { .. } => "NewCollateralFactor",
            EventKind::PricePosted { .. } => "PricePosted",
            EventKind::PoolCreated { .. } => "PoolCreated",
            EventKind::Staked { .. } => "Staked",
            EventKind::Unstaked { .. } => "Unstaked",
            EventKind::RewardClaimed { .. } => "RewardClaimed",
            EventKind::RewardRateUpdated { .. } => "RewardRateUpdated",
        }
    }

    /// Account addresses appearing as arguments of this event, used for the
    /// store's account filter.
    pub fn accounts(&self) -> Vec<&str> {
        match self {
            EventKind::Mint { minter, .. } => vec![minter],
            EventKind::Redeem { redeemer, .. } => vec![redeemer],
            EventKind::Borrow { borrower, .. } => vec![borrower],
            EventKind::RepayBorrow { payer, borrower, .. } => vec![payer, borrower],
            EventKind::LiquidateBorrow {
                liquidator,
                borrower,
                ..
            } => vec![liquidator, borrower],
            EventKind::Transfer { from, to, .. } => vec![from, to],
            EventKind::Staked { account, .. }
            | EventKind::Unstaked { account, .. }
            | EventKind::RewardClaimed { account, .. } => vec![account],
            _ => Vec::new(),
        }
    }
}

/// A decoded protocol event as persisted in the store.
///
/// Uniquely identified by `(tx_hash, log_index)`; immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub contract: String,
    pub name: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u32,
    pub timestamp: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(
        contract: String,
        block_number: u64,
        tx_hash: String,
        log_index: u32,
        timestamp: u64,
        kind: EventKind,
    ) -> Self {
        Self {
            contract: contract.to_lowercase(),
            name: kind.name().to_string(),
            block_number,
            tx_hash,
            log_index,
            timestamp,
            kind,
        }
    }
}

/// Filters for querying stored events. All fields are conjunctive; unset
/// fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub contract: Option<String>,
    pub event_name: Option<String>,
    pub account: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(contract) = &self.contract {
            if !event.contract.eq_ignore_ascii_case(contract) {
                return false;
            }
        }
        if let Some(name) = &self.event_name {
            if event.name != *name {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if !event
                .kind
                .accounts()
                .iter()
                .any(|a| a.eq_ignore_ascii_case(account))
            {
                return false;
            }
        }
        true
    }
}
