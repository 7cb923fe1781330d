//! Log decoding against the known protocol event set.
//!
//! Each indexed contract belongs to one class (market token, comptroller,
//! liquidity mining). A raw log is decoded by matching its topic0 against the
//! class's event signatures; unknown signatures are skipped so event types
//! added later do not break old indexers.

use alloy::{primitives::{Address, LogData}, sol_types::SolEvent};
use rustc_hash::FxHashMap;

use crate::{
    abis::{comptroller, market, mining},
    chain::RawLog,
    db::models::{Event, EventKind},
    errors::IndexerError,
    utils::hex_encode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractClass {
    Market,
    Comptroller,
    LiquidityMining,
}

/// The static contract address set, loaded once at startup.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    classes: FxHashMap<Address, ContractClass>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, address: Address, class: ContractClass) {
        self.classes.insert(address, class);
    }

    pub fn register_str(&mut self, address: &str, class: ContractClass) -> Result<(), IndexerError> {
        let parsed: Address = address
            .parse()
            .map_err(|e| IndexerError::InvalidInput(format!("invalid address {address:?}: {e}")))?;
        self.register(parsed, class);
        Ok(())
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.classes.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Decode a raw log into a typed [`Event`].
    ///
    /// Returns `None` for logs from unregistered contracts, logs whose topic0
    /// does not match any known signature of the contract's class, and logs
    /// whose payload fails to decode. None of these are errors.
    pub fn decode(&self, raw: &RawLog, timestamp: u64) -> Option<Event> {
        let class = self.classes.get(&raw.address)?;
        let log_data = LogData::new_unchecked(raw.topics.clone(), raw.data.clone());
        let topic0 = log_data.topics().first()?;

        let kind = match class {
            ContractClass::Market => Self::decode_market(topic0, &log_data)?,
            ContractClass::Comptroller => Self::decode_comptroller(topic0, &log_data)?,
            ContractClass::LiquidityMining => Self::decode_mining(topic0, &log_data)?,
        };

        Some(Event::new(
            hex_encode(raw.address.as_slice()),
            raw.block_number,
            raw.tx_hash.clone(),
            raw.log_index,
            timestamp,
            kind,
        ))
    }

    fn decode_market(
        topic0: &alloy::primitives::B256,
        log_data: &LogData,
    ) -> Option<EventKind> {
        match topic0 {
            t if *t == market::Mint::SIGNATURE_HASH => {
                let event = market::Mint::decode_log_data(log_data).ok()?;
                Some(EventKind::Mint {
                    minter: hex_encode(event.minter.as_slice()),
                    amount: event.mintAmount,
                })
            },
            t if *t == market::Redeem::SIGNATURE_HASH => {
                let event = market::Redeem::decode_log_data(log_data).ok()?;
                Some(EventKind::Redeem {
                    redeemer: hex_encode(event.redeemer.as_slice()),
                    amount: event.redeemAmount,
                })
            },
            t if *t == market::Borrow::SIGNATURE_HASH => {
                let event = market::Borrow::decode_log_data(log_data).ok()?;
                Some(EventKind::Borrow {
                    borrower: hex_encode(event.borrower.as_slice()),
                    amount: event.borrowAmount,
                })
            },
            t if *t == market::RepayBorrow::SIGNATURE_HASH => {
                let event = market::RepayBorrow::decode_log_data(log_data).ok()?;
                Some(EventKind::RepayBorrow {
                    payer: hex_encode(event.payer.as_slice()),
                    borrower: hex_encode(event.borrower.as_slice()),
                    amount: event.repayAmount,
                })
            },
            t if *t == market::LiquidateBorrow::SIGNATURE_HASH => {
                let event = market::LiquidateBorrow::decode_log_data(log_data).ok()?;
                Some(EventKind::LiquidateBorrow {
                    liquidator: hex_encode(event.liquidator.as_slice()),
                    borrower: hex_encode(event.borrower.as_slice()),
                    repay_amount: event.repayAmount,
                    collateral_market: hex_encode(event.collateralMarket.as_slice()),
                    seize_amount: event.seizeTokens,
                })
            },
            t if *t == market::AccrueInterest::SIGNATURE_HASH => {
                let event = market::AccrueInterest::decode_log_data(log_data).ok()?;
                Some(EventKind::AccrueInterest {
                    interest_accumulated: event.interestAccumulated,
                    borrow_index: event.borrowIndex,
                    total_borrows: event.totalBorrows,
                    total_reserves: event.totalReserves,
                })
            },
            t if *t == market::Transfer::SIGNATURE_HASH => {
                let event = market::Transfer::decode_log_data(log_data).ok()?;
                Some(EventKind::Transfer {
                    from: hex_encode(event.from.as_slice()),
                    to: hex_encode(event.to.as_slice()),
                    amount: event.amount,
                })
            },
            _ => None,
        }
    }

    fn decode_comptroller(
        topic0: &alloy::primitives::B256,
        log_data: &LogData,
    ) -> Option<EventKind> {
        match topic0 {
            t if *t == comptroller::MarketListed::SIGNATURE_HASH => {
                let event = comptroller::MarketListed::decode_log_data(log_data).ok()?;
                Some(EventKind::MarketListed {
                    market: hex_encode(event.market.as_slice()),
                    underlying: hex_encode(event.underlying.as_slice()),
                    symbol: event.symbol.clone(),
                })
            },
            t if *t == comptroller::NewCollateralFactor::SIGNATURE_HASH => {
                let event = comptroller::NewCollateralFactor::decode_log_data(log_data).ok()?;
                Some(EventKind::NewCollateralFactor {
                    market: hex_encode(event.market.as_slice()),
                    factor_mantissa: event.newCollateralFactorMantissa,
                })
            },
            t if *t == comptroller::PricePosted::SIGNATURE_HASH => {
                let event = comptroller::PricePosted::decode_log_data(log_data).ok()?;
                Some(EventKind::PricePosted {
                    asset: hex_encode(event.asset.as_slice()),
                    price_mantissa: event.newPriceMantissa,
                })
            },
            _ => None,
        }
    }

    fn decode_mining(
        topic0: &alloy::primitives::B256,
        log_data: &LogData,
    ) -> Option<EventKind> {
        match topic0 {
            t if *t == mining::PoolCreated::SIGNATURE_HASH => {
                let event = mining::PoolCreated::decode_log_data(log_data).ok()?;
                Some(EventKind::PoolCreated {
                    pool_id: event.poolId.saturating_to::<u64>(),
                    staked_asset: hex_encode(event.stakedAsset.as_slice()),
                    reward_asset: hex_encode(event.rewardAsset.as_slice()),
                    rate_per_second: event.rewardRatePerSecond,
                })
            },
            t if *t == mining::Staked::SIGNATURE_HASH => {
                let event = mining::Staked::decode_log_data(log_data).ok()?;
                Some(EventKind::Staked {
                    account: hex_encode(event.account.as_slice()),
                    pool_id: event.poolId.saturating_to::<u64>(),
                    amount: event.amount,
                })
            },
            t if *t == mining::Unstaked::SIGNATURE_HASH => {
                let event = mining::Unstaked::decode_log_data(log_data).ok()?;
                Some(EventKind::Unstaked {
                    account: hex_encode(event.account.as_slice()),
                    pool_id: event.poolId.saturating_to::<u64>(),
                    amount: event.amount,
                })
            },
            t if *t == mining::RewardClaimed::SIGNATURE_HASH => {
                let event = mining::RewardClaimed::decode_log_data(log_data).ok()?;
                Some(EventKind::RewardClaimed {
                    account: hex_encode(event.account.as_slice()),
                    pool_id: event.poolId.saturating_to::<u64>(),
                    amount: event.amount,
                })
            },
            t if *t == mining::RewardRateUpdated::SIGNATURE_HASH => {
                let event = mining::RewardRateUpdated::decode_log_data(log_data).ok()?;
                Some(EventKind::RewardRateUpdated {
                    pool_id: event.poolId.saturating_to::<u64>(),
                    rate_per_second: event.newRatePerSecond,
                })
            },
            _ => None,
        }
    }
}
