use alloy::sol;

sol! {
    event PoolCreated(uint256 indexed poolId, address stakedAsset, address rewardAsset, uint256 rewardRatePerSecond);
    event Staked(address indexed account, uint256 indexed poolId, uint256 amount);
    event Unstaked(address indexed account, uint256 indexed poolId, uint256 amount);
    event RewardClaimed(address indexed account, uint256 indexed poolId, uint256 amount);
    event RewardRateUpdated(uint256 indexed poolId, uint256 oldRatePerSecond, uint256 newRatePerSecond);
}
