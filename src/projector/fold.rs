//! Folding rules: how each event class mutates the projected snapshot.
//!
//! The fold is deterministic and total over well-formed event logs. Any
//! decrement uses checked arithmetic; an amount exceeding the current balance
//! is a [`IndexerError::DataIntegrityFault`], never a silent clamp, since it
//! means an event was missed or mis-decoded.

use alloy::primitives::U256;

use crate::{
    db::models::{Event, EventKind},
    errors::IndexerError,
    projector::state::{AccountPosition, MarketState, MiningPool, Snapshot, StakePosition},
    utils::ZERO_ADDRESS,
};

fn checked_sub(current: U256, amount: U256, context: &str) -> Result<U256, IndexerError> {
    current.checked_sub(amount).ok_or_else(|| {
        IndexerError::DataIntegrityFault(format!(
            "{context}: amount {amount} exceeds balance {current}"
        ))
    })
}

fn checked_add(current: U256, amount: U256, context: &str) -> Result<U256, IndexerError> {
    current.checked_add(amount).ok_or_else(|| {
        IndexerError::DataIntegrityFault(format!("{context}: overflow adding {amount}"))
    })
}

impl Snapshot {
    fn market_mut(&mut self, address: &str) -> &mut MarketState {
        self.markets
            .entry(address.to_string())
            .or_insert_with(|| MarketState::new(address.to_string()))
    }

    fn position_mut(&mut self, account: &str, market: &str) -> &mut AccountPosition {
        self.positions
            .entry(account.to_string())
            .or_default()
            .entry(market.to_string())
            .or_insert_with(|| AccountPosition::new(account.to_string(), market.to_string()))
    }

    fn pool_mut(&mut self, pool_id: u64) -> Result<&mut MiningPool, IndexerError> {
        self.pools.get_mut(&pool_id).ok_or_else(|| {
            IndexerError::DataIntegrityFault(format!("event for unknown mining pool {pool_id}"))
        })
    }

    /// Accrue one stake up to `now` at the pool's current rate:
    /// `accrued += staked_amount * rate_per_second * elapsed_seconds`.
    /// Rate changes are handled by the caller splitting intervals at each
    /// `RewardRateUpdated` event, so the rate is constant over `elapsed`.
    fn accrue_stake(
        &mut self,
        pool_id: u64,
        account: &str,
        now: u64,
    ) -> Result<(), IndexerError> {
        let rate = self.pool_mut(pool_id)?.reward_rate_per_second;
        let stake = self
            .stakes
            .entry(pool_id)
            .or_default()
            .entry(account.to_string())
            .or_insert_with(|| StakePosition {
                account: account.to_string(),
                pool_id,
                staked_amount: U256::ZERO,
                accrued_reward: U256::ZERO,
                last_update_timestamp: now,
            });
        if now > stake.last_update_timestamp {
            let elapsed = U256::from(now - stake.last_update_timestamp);
            let earned = stake
                .staked_amount
                .checked_mul(rate)
                .and_then(|v| v.checked_mul(elapsed))
                .ok_or_else(|| {
                    IndexerError::DataIntegrityFault(format!(
                        "reward accrual overflow for pool {pool_id}"
                    ))
                })?;
            stake.accrued_reward =
                checked_add(stake.accrued_reward, earned, "reward accrual")?;
            stake.last_update_timestamp = now;
        }
        Ok(())
    }

    /// Apply one event to the snapshot. Events must be applied in
    /// `(block_number, log_index)` order.
    pub fn apply(&mut self, event: &Event) -> Result<(), IndexerError> {
        self.folded_to_block = Some(
            self.folded_to_block
                .map_or(event.block_number, |b| b.max(event.block_number)),
        );
        self.last_event_timestamp = self.last_event_timestamp.max(event.timestamp);

        match &event.kind {
            EventKind::Mint { minter, amount } => {
                let market = self.market_mut(&event.contract);
                market.total_supply =
                    checked_add(market.total_supply, *amount, "market total supply")?;
                let position = self.position_mut(minter, &event.contract);
                position.supply_underlying =
                    checked_add(position.supply_underlying, *amount, "account supply")?;
            },
            EventKind::Redeem { redeemer, amount } => {
                let market = self.market_mut(&event.contract);
                market.total_supply =
                    checked_sub(market.total_supply, *amount, "market total supply")?;
                let position = self.position_mut(redeemer, &event.contract);
                position.supply_underlying =
                    checked_sub(position.supply_underlying, *amount, "account supply")?;
            },
            EventKind::Borrow { borrower, amount } => {
                let market = self.market_mut(&event.contract);
                market.total_borrow =
                    checked_add(market.total_borrow, *amount, "market total borrow")?;
                let position = self.position_mut(borrower, &event.contract);
                position.borrow_balance =
                    checked_add(position.borrow_balance, *amount, "account borrow")?;
            },
            EventKind::RepayBorrow {
                borrower, amount, ..
            } => {
                let market = self.market_mut(&event.contract);
                market.total_borrow =
                    checked_sub(market.total_borrow, *amount, "market total borrow")?;
                let position = self.position_mut(borrower, &event.contract);
                position.borrow_balance =
                    checked_sub(position.borrow_balance, *amount, "account borrow")?;
            },
            EventKind::LiquidateBorrow {
                liquidator,
                borrower,
                repay_amount,
                collateral_market,
                seize_amount,
            } => {
                let market = self.market_mut(&event.contract);
                market.total_borrow =
                    checked_sub(market.total_borrow, *repay_amount, "market total borrow")?;
                let position = self.position_mut(borrower, &event.contract);
                position.borrow_balance =
                    checked_sub(position.borrow_balance, *repay_amount, "liquidated borrow")?;
                // Seized collateral moves from borrower to liquidator in the
                // collateral market; its total supply is unchanged.
                let seized = self.position_mut(borrower, collateral_market);
                seized.supply_underlying =
                    checked_sub(seized.supply_underlying, *seize_amount, "seized collateral")?;
                let received = self.position_mut(liquidator, collateral_market);
                received.supply_underlying = checked_add(
                    received.supply_underlying,
                    *seize_amount,
                    "seized collateral",
                )?;
            },
            EventKind::AccrueInterest {
                borrow_index,
                total_reserves,
                ..
            } => {
                // Updates exchange-rate inputs only; principal is moved by
                // the explicit supply/borrow events.
                let market = self.market_mut(&event.contract);
                market.reserves = *total_reserves;
                market.borrow_index = *borrow_index;
            },
            EventKind::Transfer { from, to, amount } => {
                // Mint/redeem legs (counterparty is the market itself or the
                // zero address) are already accounted by Mint/Redeem.
                if from == &event.contract
                    || to == &event.contract
                    || from == ZERO_ADDRESS
                    || to == ZERO_ADDRESS
                {
                    return Ok(());
                }
                let sender = self.position_mut(from, &event.contract);
                sender.supply_underlying =
                    checked_sub(sender.supply_underlying, *amount, "transferred supply")?;
                let receiver = self.position_mut(to, &event.contract);
                receiver.supply_underlying =
                    checked_add(receiver.supply_underlying, *amount, "transferred supply")?;
            },

            EventKind::MarketListed {
                market,
                underlying,
                symbol,
            } => {
                let posted_price = self.prices.get(underlying).copied();
                let state = self.market_mut(market);
                state.listed = true;
                state.underlying = underlying.clone();
                state.symbol = symbol.clone();
                if state.price_mantissa.is_none() {
                    state.price_mantissa = posted_price;
                }
            },
            EventKind::NewCollateralFactor {
                market,
                factor_mantissa,
            } => {
                self.market_mut(market).collateral_factor_mantissa = *factor_mantissa;
            },
            EventKind::PricePosted {
                asset,
                price_mantissa,
            } => {
                self.prices.insert(asset.clone(), *price_mantissa);
                for state in self.markets.values_mut() {
                    if state.underlying == *asset {
                        state.price_mantissa = Some(*price_mantissa);
                    }
                }
            },

            EventKind::PoolCreated {
                pool_id,
                staked_asset,
                reward_asset,
                rate_per_second,
            } => {
                self.pools.insert(
                    *pool_id,
                    MiningPool {
                        pool_id: *pool_id,
                        staked_asset: staked_asset.clone(),
                        reward_asset: reward_asset.clone(),
                        total_staked: U256::ZERO,
                        reward_rate_per_second: *rate_per_second,
                    },
                );
                self.stakes.entry(*pool_id).or_default();
            },
            EventKind::Staked {
                account,
                pool_id,
                amount,
            } => {
                self.accrue_stake(*pool_id, account, event.timestamp)?;
                let pool = self.pool_mut(*pool_id)?;
                pool.total_staked = checked_add(pool.total_staked, *amount, "pool total staked")?;
                let stake = self
                    .stakes
                    .get_mut(pool_id)
                    .and_then(|s| s.get_mut(account))
                    .ok_or_else(|| {
                        IndexerError::DataIntegrityFault(format!(
                            "stake missing after accrual for pool {pool_id}"
                        ))
                    })?;
                stake.staked_amount = checked_add(stake.staked_amount, *amount, "staked amount")?;
            },
            EventKind::Unstaked {
                account,
                pool_id,
                amount,
            } => {
                self.accrue_stake(*pool_id, account, event.timestamp)?;
                let pool = self.pool_mut(*pool_id)?;
                pool.total_staked = checked_sub(pool.total_staked, *amount, "pool total staked")?;
                let stake = self
                    .stakes
                    .get_mut(pool_id)
                    .and_then(|s| s.get_mut(account))
                    .ok_or_else(|| {
                        IndexerError::DataIntegrityFault(format!(
                            "unstake by unknown staker in pool {pool_id}"
                        ))
                    })?;
                stake.staked_amount = checked_sub(stake.staked_amount, *amount, "staked amount")?;
            },
            EventKind::RewardClaimed {
                account,
                pool_id,
                amount,
            } => {
                self.accrue_stake(*pool_id, account, event.timestamp)?;
                let stake = self
                    .stakes
                    .get_mut(pool_id)
                    .and_then(|s| s.get_mut(account))
                    .ok_or_else(|| {
                        IndexerError::DataIntegrityFault(format!(
                            "claim by unknown staker in pool {pool_id}"
                        ))
                    })?;
                stake.accrued_reward =
                    checked_sub(stake.accrued_reward, *amount, "claimed reward")?;
            },
            EventKind::RewardRateUpdated {
                pool_id,
                rate_per_second,
            } => {
                // Accrue every stake at the old rate up to the boundary, then
                // switch: rate changes are never retroactive.
                let accounts: Vec<String> = self
                    .stakes
                    .get(pool_id)
                    .map(|s| s.keys().cloned().collect())
                    .unwrap_or_default();
                for account in accounts {
                    self.accrue_stake(*pool_id, &account, event.timestamp)?;
                }
                self.pool_mut(*pool_id)?.reward_rate_per_second = *rate_per_second;
            },
        }
        Ok(())
    }

    /// Bring every stake's accrual forward to the last folded event's
    /// timestamp. Idempotent, and exact under incremental extension because
    /// accrual is linear in elapsed time while the rate is constant.
    pub fn settle_rewards(&mut self) -> Result<(), IndexerError> {
        let now = self.last_event_timestamp;
        let pending: Vec<(u64, String)> = self
            .stakes
            .iter()
            .flat_map(|(pool_id, stakes)| {
                stakes.keys().map(move |account| (*pool_id, account.clone()))
            })
            .collect();
        for (pool_id, account) in pending {
            self.accrue_stake(pool_id, &account, now)?;
        }
        Ok(())
    }
}
