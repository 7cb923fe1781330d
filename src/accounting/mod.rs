//! Pure accounting functions over a projected snapshot.
//!
//! Deterministic, side-effect-free and total for well-formed snapshots:
//! out-of-domain inputs (missing market, missing price) surface as
//! [`IndexerError::InvalidInput`], never as silently zeroed numbers.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    errors::IndexerError,
    projector::{AccountPosition, MarketState},
    utils::{mantissa_to_f64, u256_to_f64},
};

/// Jump-rate interest curve: linear up to `kink` utilization, then a steeper
/// slope above it. All parameters are annualized fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRateModel {
    pub base_rate: f64,
    pub multiplier: f64,
    pub jump_multiplier: f64,
    pub kink: f64,
    pub reserve_factor: f64,
}

impl Default for InterestRateModel {
    fn default() -> Self {
        Self {
            base_rate: 0.02,
            multiplier: 0.1,
            jump_multiplier: 3.0,
            kink: 0.8,
            reserve_factor: 0.1,
        }
    }
}

/// Collateral and debt summary for one account across all its positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountHealth {
    pub borrow_limit_usd: f64,
    pub total_borrowed_usd: f64,
    /// `borrow_limit / total_borrowed`; `None` when the account has no
    /// borrow (infinitely healthy).
    pub health_factor: Option<f64>,
    pub liquidatable: bool,
}

/// `total_borrow / (total_supply + reserves)`, defined as 0 when the
/// denominator is 0.
pub fn utilization(market: &MarketState) -> f64 {
    let denominator = market.total_supply.saturating_add(market.reserves);
    if denominator.is_zero() {
        return 0.0;
    }
    u256_to_f64(market.total_borrow, 18) / u256_to_f64(denominator, 18)
}

/// Annualized borrow rate at the market's current utilization.
pub fn borrow_apr(model: &InterestRateModel, market: &MarketState) -> f64 {
    let util = utilization(market);
    if util <= model.kink {
        model.base_rate + model.multiplier * util
    } else {
        model.base_rate + model.multiplier * model.kink + model.jump_multiplier * (util - model.kink)
    }
}

/// Annualized supply rate: `borrow_apr * utilization * (1 - reserve_factor)`.
pub fn supply_apr(model: &InterestRateModel, market: &MarketState) -> f64 {
    let util = utilization(market);
    borrow_apr(model, market) * util * (1.0 - model.reserve_factor)
}

/// USD value of a raw underlying amount at the market's posted price.
pub fn usd_value(amount: U256, market: &MarketState) -> Result<f64, IndexerError> {
    let price = market.price_mantissa.ok_or_else(|| {
        IndexerError::InvalidInput(format!("no posted price for market {}", market.address))
    })?;
    Ok(u256_to_f64(amount, 18) * mantissa_to_f64(price))
}

/// Borrow limit, borrowed value, health factor and liquidation eligibility
/// for one account's positions.
///
/// `borrow_limit = Σ supply_usd * collateral_factor`;
/// `liquidatable` iff `total_borrowed_usd > borrow_limit` (shortfall > 0).
pub fn account_health(
    positions: &BTreeMap<String, AccountPosition>,
    markets: &BTreeMap<String, MarketState>,
) -> Result<AccountHealth, IndexerError> {
    let mut borrow_limit_usd = 0.0;
    let mut total_borrowed_usd = 0.0;

    for (market_address, position) in positions {
        if position.supply_underlying.is_zero() && position.borrow_balance.is_zero() {
            continue;
        }
        let market = markets.get(market_address).ok_or_else(|| {
            IndexerError::InvalidInput(format!("position in unknown market {market_address}"))
        })?;

        if !position.supply_underlying.is_zero() {
            let collateral_factor = mantissa_to_f64(market.collateral_factor_mantissa);
            borrow_limit_usd +=
                usd_value(position.supply_underlying, market)? * collateral_factor;
        }
        if !position.borrow_balance.is_zero() {
            total_borrowed_usd += usd_value(position.borrow_balance, market)?;
        }
    }

    let health_factor = if total_borrowed_usd > 0.0 {
        Some(borrow_limit_usd / total_borrowed_usd)
    } else {
        None
    };

    Ok(AccountHealth {
        borrow_limit_usd,
        total_borrowed_usd,
        health_factor,
        liquidatable: total_borrowed_usd > borrow_limit_usd,
    })
}

/// Remaining USD borrowing power, floored at zero.
pub fn available_to_borrow_usd(health: &AccountHealth) -> f64 {
    (health.borrow_limit_usd - health.total_borrowed_usd).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAD: u64 = 1_000_000_000_000_000_000;

    fn tokens(n: u64) -> U256 {
        U256::from(n) * U256::from(WAD)
    }

    fn mantissa(numerator: u64, denominator: u64) -> U256 {
        U256::from(numerator) * U256::from(WAD) / U256::from(denominator)
    }

    fn market(address: &str, supply: u64, borrow: u64, cf_pct: u64, price: u64) -> MarketState {
        let mut market = MarketState::new(address.to_string());
        market.total_supply = tokens(supply);
        market.total_borrow = tokens(borrow);
        market.collateral_factor_mantissa = mantissa(cf_pct, 100);
        market.price_mantissa = Some(mantissa(price, 1));
        market
    }

    #[test]
    fn test_utilization_zero_denominator() {
        let empty = MarketState::new("0xa".to_string());
        assert_eq!(utilization(&empty), 0.0);
    }

    #[test]
    fn test_utilization_includes_reserves() {
        let mut m = market("0xa", 900, 400, 50, 1);
        m.reserves = tokens(100);
        assert!((utilization(&m) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_borrow_apr_below_and_above_kink() {
        let model = InterestRateModel::default();
        let below = market("0xa", 1000, 400, 50, 1); // util 0.4
        assert!((borrow_apr(&model, &below) - (0.02 + 0.1 * 0.4)).abs() < 1e-12);

        let above = market("0xa", 1000, 900, 50, 1); // util 0.9 > kink 0.8
        let expected = 0.02 + 0.1 * 0.8 + 3.0 * (0.9 - 0.8);
        assert!((borrow_apr(&model, &above) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_supply_apr_formula() {
        let model = InterestRateModel::default();
        let m = market("0xa", 1000, 400, 50, 1);
        let expected = borrow_apr(&model, &m) * 0.4 * (1.0 - model.reserve_factor);
        assert!((supply_apr(&model, &m) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_usd_value_requires_price() {
        let mut m = market("0xa", 0, 0, 50, 3);
        assert_eq!(usd_value(tokens(2), &m).unwrap(), 6.0);

        m.price_mantissa = None;
        assert!(matches!(
            usd_value(tokens(2), &m),
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_health_factor_boundary() {
        // Market A: cf 0.5, price 1; account supplies 1000 → limit 500.
        // Market B: price 1; account borrows 400 → health 1.25.
        let markets: BTreeMap<String, MarketState> = [
            ("0xa".to_string(), market("0xa", 1000, 0, 50, 1)),
            ("0xb".to_string(), market("0xb", 0, 400, 0, 1)),
        ]
        .into();

        let mut positions: BTreeMap<String, AccountPosition> = BTreeMap::new();
        let mut supply = AccountPosition::new("0xalice".to_string(), "0xa".to_string());
        supply.supply_underlying = tokens(1000);
        positions.insert("0xa".to_string(), supply);
        let mut debt = AccountPosition::new("0xalice".to_string(), "0xb".to_string());
        debt.borrow_balance = tokens(400);
        positions.insert("0xb".to_string(), debt);

        let health = account_health(&positions, &markets).unwrap();
        assert_eq!(health.borrow_limit_usd, 500.0);
        assert_eq!(health.total_borrowed_usd, 400.0);
        assert_eq!(health.health_factor, Some(1.25));
        assert!(!health.liquidatable);
        assert_eq!(available_to_borrow_usd(&health), 100.0);

        // Borrow 150 more: 550 > 500 → liquidation-eligible
        positions.get_mut("0xb").unwrap().borrow_balance = tokens(550);
        let health = account_health(&positions, &markets).unwrap();
        assert!(health.liquidatable);
        assert_eq!(available_to_borrow_usd(&health), 0.0);
    }

    #[test]
    fn test_no_borrow_means_no_health_factor() {
        let markets: BTreeMap<String, MarketState> =
            [("0xa".to_string(), market("0xa", 10, 0, 50, 1))].into();
        let mut positions = BTreeMap::new();
        let mut supply = AccountPosition::new("0xalice".to_string(), "0xa".to_string());
        supply.supply_underlying = tokens(10);
        positions.insert("0xa".to_string(), supply);

        let health = account_health(&positions, &markets).unwrap();
        assert_eq!(health.health_factor, None);
        assert!(!health.liquidatable);
    }

    #[test]
    fn test_position_in_unknown_market_is_invalid_input() {
        let markets = BTreeMap::new();
        let mut positions = BTreeMap::new();
        let mut supply = AccountPosition::new("0xalice".to_string(), "0xa".to_string());
        supply.supply_underlying = tokens(1);
        positions.insert("0xa".to_string(), supply);

        assert!(matches!(
            account_health(&positions, &markets),
            Err(IndexerError::InvalidInput(_))
        ));
    }
}
