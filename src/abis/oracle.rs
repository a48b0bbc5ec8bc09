use alloy::sol;

sol! {
    event PriceUpdated(address indexed token, uint256 indexed tokenId, uint256 oldPrice, uint256 newPrice, uint256 timestamp);
}
