//! Event signatures for the lending protocol contracts.
//!
//! Each contract class exposes a closed set of known events declared with
//! `sol!`. Raw logs are matched by computed topic0 signature; anything
//! outside this set is skipped by the decoder.

pub mod comptroller;
pub mod market;
pub mod mining;

pub use comptroller::{MarketListed, NewCollateralFactor, PricePosted};
pub use market::{
    AccrueInterest, Borrow, LiquidateBorrow, Mint, Redeem, RepayBorrow, Transfer,
};
pub use mining::{PoolCreated, RewardClaimed, RewardRateUpdated, Staked, Unstaked};
