//! State projection: folds the stored event log into current aggregate
//! state (markets, account positions, liquidity-mining pools and stakes).
//!
//! Projections are derived, never independently owned: the event log is the
//! source of truth and any cached snapshot can be rebuilt from it. The cache
//! is keyed by the checkpoint it was folded to and extended incrementally by
//! folding only the delta; if the checkpoint ever regresses (should never
//! happen) the projection is rebuilt from scratch.

mod fold;
mod state;

use std::{collections::BTreeMap, sync::{Arc, RwLock}};

use crate::{db::EventStore, errors::IndexerError};

pub use state::{AccountPosition, MarketState, MiningPool, Snapshot, StakePosition};

pub struct Projector {
    store: Arc<EventStore>,
    cache: RwLock<Option<Snapshot>>,
}

impl Projector {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    /// Current projected snapshot, consistent with the checkpoint: the
    /// checkpoint is read first and only events up to it are folded, so a
    /// concurrent indexer batch is either fully visible or not at all.
    pub fn snapshot(&self) -> Result<Snapshot, IndexerError> {
        let checkpoint = match self.store.checkpoint()? {
            Some(checkpoint) => checkpoint,
            None => return Ok(Snapshot::default()),
        };

        let cached = {
            let guard = match self.cache.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.clone()
        };

        let mut snapshot = match cached {
            // Cache usable only if it has not run ahead of the checkpoint
            Some(snap) if snap.folded_to_block.map_or(true, |b| b <= checkpoint) => snap,
            _ => Snapshot::default(),
        };

        if snapshot.folded_to_block != Some(checkpoint) {
            let from = snapshot.folded_to_block.map_or(0, |b| b + 1);
            let events = self.store.events_in_range(from, checkpoint)?;
            for event in &events {
                snapshot.apply(event)?;
            }
            snapshot.settle_rewards()?;
            snapshot.folded_to_block = Some(checkpoint);

            let mut guard = match self.cache.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = Some(snapshot.clone());
        }

        Ok(snapshot)
    }

    /// Reference behavior: drop the cache and refold the full event log.
    pub fn rebuild(&self) -> Result<Snapshot, IndexerError> {
        {
            let mut guard = match self.cache.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = None;
        }
        self.snapshot()
    }

    pub fn project_markets(&self) -> Result<BTreeMap<String, MarketState>, IndexerError> {
        Ok(self.snapshot()?.markets)
    }

    pub fn project_account(
        &self,
        account: &str,
    ) -> Result<BTreeMap<String, AccountPosition>, IndexerError> {
        let account = account.to_lowercase();
        Ok(self
            .snapshot()?
            .positions
            .get(&account)
            .cloned()
            .unwrap_or_default())
    }

    pub fn project_liquidity_mining(
        &self,
    ) -> Result<BTreeMap<u64, (MiningPool, BTreeMap<String, StakePosition>)>, IndexerError> {
        let snapshot = self.snapshot()?;
        let mut result = BTreeMap::new();
        for (pool_id, pool) in &snapshot.pools {
            let stakes = snapshot.stakes.get(pool_id).cloned().unwrap_or_default();
            result.insert(*pool_id, (pool.clone(), stakes));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::db::models::{Event, EventKind};

    const MARKET_A: &str = "0x000000000000000000000000000000000000000a";
    const MARKET_B: &str = "0x000000000000000000000000000000000000000b";
    const MINING: &str = "0x00000000000000000000000000000000000000e1";
    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
    const BOB: &str = "0x0000000000000000000000000000000000000b0b";

    fn event(contract: &str, block: u64, log_index: u32, timestamp: u64, kind: EventKind) -> Event {
        Event::new(
            contract.to_string(),
            block,
            format!("0x{block:02x}{log_index:02x}"),
            log_index,
            timestamp,
            kind,
        )
    }

    fn lending_sequence() -> Vec<Event> {
        vec![
            event(
                MARKET_A,
                1,
                0,
                12,
                EventKind::Mint {
                    minter: ALICE.to_string(),
                    amount: U256::from(1_000u64),
                },
            ),
            event(
                MARKET_A,
                2,
                0,
                24,
                EventKind::Borrow {
                    borrower: ALICE.to_string(),
                    amount: U256::from(400u64),
                },
            ),
            event(
                MARKET_A,
                3,
                0,
                36,
                EventKind::RepayBorrow {
                    payer: ALICE.to_string(),
                    borrower: ALICE.to_string(),
                    amount: U256::from(150u64),
                },
            ),
        ]
    }

    #[test]
    fn test_fold_is_deterministic() {
        let mut first = Snapshot::default();
        let mut second = Snapshot::default();
        for e in lending_sequence() {
            first.apply(&e).unwrap();
            second.apply(&e).unwrap();
        }
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );

        let market = &first.markets[MARKET_A];
        assert_eq!(market.total_supply, U256::from(1_000u64));
        assert_eq!(market.total_borrow, U256::from(250u64));
        let position = &first.positions[ALICE][MARKET_A];
        assert_eq!(position.supply_underlying, U256::from(1_000u64));
        assert_eq!(position.borrow_balance, U256::from(250u64));
    }

    #[test]
    fn test_redeem_beyond_balance_is_integrity_fault() {
        let mut snapshot = Snapshot::default();
        snapshot
            .apply(&event(
                MARKET_A,
                1,
                0,
                12,
                EventKind::Mint {
                    minter: ALICE.to_string(),
                    amount: U256::from(100u64),
                },
            ))
            .unwrap();

        let err = snapshot
            .apply(&event(
                MARKET_A,
                2,
                0,
                24,
                EventKind::Redeem {
                    redeemer: ALICE.to_string(),
                    amount: U256::from(101u64),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, IndexerError::DataIntegrityFault(_)));
    }

    #[test]
    fn test_transfer_moves_supply_and_skips_market_legs() {
        let mut snapshot = Snapshot::default();
        snapshot
            .apply(&event(
                MARKET_A,
                1,
                0,
                12,
                EventKind::Mint {
                    minter: ALICE.to_string(),
                    amount: U256::from(500u64),
                },
            ))
            .unwrap();
        // Mint leg: counterparty is the market contract, must be a no-op
        snapshot
            .apply(&event(
                MARKET_A,
                1,
                1,
                12,
                EventKind::Transfer {
                    from: MARKET_A.to_string(),
                    to: ALICE.to_string(),
                    amount: U256::from(500u64),
                },
            ))
            .unwrap();
        snapshot
            .apply(&event(
                MARKET_A,
                2,
                0,
                24,
                EventKind::Transfer {
                    from: ALICE.to_string(),
                    to: BOB.to_string(),
                    amount: U256::from(200u64),
                },
            ))
            .unwrap();

        assert_eq!(
            snapshot.positions[ALICE][MARKET_A].supply_underlying,
            U256::from(300u64)
        );
        assert_eq!(
            snapshot.positions[BOB][MARKET_A].supply_underlying,
            U256::from(200u64)
        );
        // Totals untouched by account-to-account transfers
        assert_eq!(snapshot.markets[MARKET_A].total_supply, U256::from(500u64));
    }

    #[test]
    fn test_liquidation_moves_debt_and_collateral() {
        let mut snapshot = Snapshot::default();
        for e in [
            event(
                MARKET_A,
                1,
                0,
                12,
                EventKind::Mint {
                    minter: ALICE.to_string(),
                    amount: U256::from(1_000u64),
                },
            ),
            event(
                MARKET_B,
                2,
                0,
                24,
                EventKind::Borrow {
                    borrower: ALICE.to_string(),
                    amount: U256::from(600u64),
                },
            ),
            event(
                MARKET_B,
                3,
                0,
                36,
                EventKind::LiquidateBorrow {
                    liquidator: BOB.to_string(),
                    borrower: ALICE.to_string(),
                    repay_amount: U256::from(300u64),
                    collateral_market: MARKET_A.to_string(),
                    seize_amount: U256::from(330u64),
                },
            ),
        ] {
            snapshot.apply(&e).unwrap();
        }

        assert_eq!(
            snapshot.positions[ALICE][MARKET_B].borrow_balance,
            U256::from(300u64)
        );
        assert_eq!(snapshot.markets[MARKET_B].total_borrow, U256::from(300u64));
        assert_eq!(
            snapshot.positions[ALICE][MARKET_A].supply_underlying,
            U256::from(670u64)
        );
        assert_eq!(
            snapshot.positions[BOB][MARKET_A].supply_underlying,
            U256::from(330u64)
        );
        assert_eq!(snapshot.markets[MARKET_A].total_supply, U256::from(1_000u64));
    }

    #[test]
    fn test_accrue_interest_updates_reserves_not_principal() {
        let mut snapshot = Snapshot::default();
        snapshot
            .apply(&event(
                MARKET_A,
                1,
                0,
                12,
                EventKind::Borrow {
                    borrower: ALICE.to_string(),
                    amount: U256::from(500u64),
                },
            ))
            .unwrap();
        snapshot
            .apply(&event(
                MARKET_A,
                2,
                0,
                24,
                EventKind::AccrueInterest {
                    interest_accumulated: U256::from(7u64),
                    borrow_index: U256::from(1_010u64),
                    total_borrows: U256::from(507u64),
                    total_reserves: U256::from(2u64),
                },
            ))
            .unwrap();

        let market = &snapshot.markets[MARKET_A];
        assert_eq!(market.reserves, U256::from(2u64));
        assert_eq!(market.borrow_index, U256::from(1_010u64));
        assert_eq!(market.total_borrow, U256::from(500u64));
    }

    #[test]
    fn test_reward_accrual_splits_at_rate_update() {
        let r1 = U256::from(3u64);
        let r2 = U256::from(5u64);
        let mut snapshot = Snapshot::default();
        for e in [
            event(
                MINING,
                1,
                0,
                1_000,
                EventKind::PoolCreated {
                    pool_id: 1,
                    staked_asset: MARKET_A.to_string(),
                    reward_asset: MARKET_B.to_string(),
                    rate_per_second: r1,
                },
            ),
            event(
                MINING,
                2,
                0,
                1_000,
                EventKind::Staked {
                    account: ALICE.to_string(),
                    pool_id: 1,
                    amount: U256::from(100u64),
                },
            ),
            event(
                MINING,
                3,
                0,
                1_010,
                EventKind::RewardRateUpdated {
                    pool_id: 1,
                    rate_per_second: r2,
                },
            ),
            event(
                MINING,
                4,
                0,
                1_015,
                EventKind::Unstaked {
                    account: ALICE.to_string(),
                    pool_id: 1,
                    amount: U256::from(100u64),
                },
            ),
        ] {
            snapshot.apply(&e).unwrap();
        }

        // 100 * r1 * 10s + 100 * r2 * 5s, not 15s at either single rate
        let expected = U256::from(100u64) * r1 * U256::from(10u64)
            + U256::from(100u64) * r2 * U256::from(5u64);
        let stake = &snapshot.stakes[&1][ALICE];
        assert_eq!(stake.accrued_reward, expected);
        assert_eq!(stake.staked_amount, U256::ZERO);
        assert_eq!(snapshot.pools[&1].total_staked, U256::ZERO);
    }

    #[test]
    fn test_claim_beyond_accrued_is_integrity_fault() {
        let mut snapshot = Snapshot::default();
        for e in [
            event(
                MINING,
                1,
                0,
                1_000,
                EventKind::PoolCreated {
                    pool_id: 1,
                    staked_asset: MARKET_A.to_string(),
                    reward_asset: MARKET_B.to_string(),
                    rate_per_second: U256::from(1u64),
                },
            ),
            event(
                MINING,
                2,
                0,
                1_000,
                EventKind::Staked {
                    account: ALICE.to_string(),
                    pool_id: 1,
                    amount: U256::from(10u64),
                },
            ),
        ] {
            snapshot.apply(&e).unwrap();
        }

        // 10 staked * rate 1 * 5s = 50 accrued; claiming 51 must fault
        let err = snapshot
            .apply(&event(
                MINING,
                3,
                0,
                1_005,
                EventKind::RewardClaimed {
                    account: ALICE.to_string(),
                    pool_id: 1,
                    amount: U256::from(51u64),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, IndexerError::DataIntegrityFault(_)));
    }

    #[test]
    fn test_price_posted_before_listing_is_applied_on_listing() {
        let underlying = "0x00000000000000000000000000000000000000f1";
        let mut snapshot = Snapshot::default();
        snapshot
            .apply(&event(
                "0xc0",
                1,
                0,
                12,
                EventKind::PricePosted {
                    asset: underlying.to_string(),
                    price_mantissa: U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64)),
                },
            ))
            .unwrap();
        snapshot
            .apply(&event(
                "0xc0",
                2,
                0,
                24,
                EventKind::MarketListed {
                    market: MARKET_A.to_string(),
                    underlying: underlying.to_string(),
                    symbol: "TKA".to_string(),
                },
            ))
            .unwrap();

        let market = &snapshot.markets[MARKET_A];
        assert!(market.listed);
        assert_eq!(market.symbol, "TKA");
        assert!(market.price_mantissa.is_some());
    }

    #[test]
    fn test_incremental_projection_matches_full_rebuild() {
        let store = Arc::new(EventStore::open_temporary().unwrap());
        let projector = Projector::new(store.clone());

        let events = lending_sequence();
        store.insert(&events[..2]).unwrap();
        store.set_checkpoint(2).unwrap();
        let partial = projector.snapshot().unwrap();
        assert_eq!(partial.folded_to_block, Some(2));

        // Extend: one more batch lands, cache folds only the delta
        store.insert(&events[2..]).unwrap();
        store.set_checkpoint(3).unwrap();
        let incremental = projector.snapshot().unwrap();
        let rebuilt = projector.rebuild().unwrap();
        assert_eq!(incremental, rebuilt);
        assert_eq!(
            incremental.markets[MARKET_A].total_borrow,
            U256::from(250u64)
        );
    }

    #[test]
    fn test_project_account_is_scoped_and_case_insensitive() {
        let store = Arc::new(EventStore::open_temporary().unwrap());
        store.insert(&lending_sequence()).unwrap();
        store.set_checkpoint(3).unwrap();

        let projector = Projector::new(store);
        let positions = projector
            .project_account(&ALICE.to_uppercase().replace("0X", "0x"))
            .unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[MARKET_A].borrow_balance, U256::from(250u64));
        assert!(projector.project_account(BOB).unwrap().is_empty());
    }
}
