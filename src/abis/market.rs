use alloy::sol;

sol! {
    event Mint(address indexed minter, uint256 mintAmount, uint256 mintTokens);
    event Redeem(address indexed redeemer, uint256 redeemAmount, uint256 redeemTokens);
    event Borrow(address indexed borrower, uint256 borrowAmount, uint256 accountBorrows, uint256 totalBorrows);
    event RepayBorrow(address indexed payer, address indexed borrower, uint256 repayAmount, uint256 accountBorrows, uint256 totalBorrows);
    event LiquidateBorrow(address indexed liquidator, address indexed borrower, uint256 repayAmount, address collateralMarket, uint256 seizeTokens);
    event AccrueInterest(uint256 interestAccumulated, uint256 borrowIndex, uint256 totalBorrows, uint256 totalReserves);
    event Transfer(address indexed from, address indexed to, uint256 amount);
}
