use alloy::sol;

sol! {
    event MarketListed(address market, address underlying, string symbol);
    event NewCollateralFactor(address indexed market, uint256 oldCollateralFactorMantissa, uint256 newCollateralFactorMantissa);
    event PricePosted(address indexed asset, uint256 previousPriceMantissa, uint256 newPriceMantissa);
}
