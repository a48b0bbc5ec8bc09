use alloy::sol;

sol! {
    event TokensPurchased(address indexed buyer, uint256 ethIn, uint256 tokensOut, uint256 timestamp);
    event TokensSold(address indexed seller, uint256 tokensIn, uint256 ethOut, uint256 timestamp);
    event LiquidityAdded(address indexed provider, uint256 tokenAmount, uint256 ethAmount, uint256 liquidityTokens);
    event LiquidityRemoved(address indexed provider, uint256 tokenAmount, uint256 ethAmount, uint256 liquidityTokens);
}
