use alloy::sol;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    event AssetMinted(uint256 indexed tokenId, address indexed owner, string name, uint256 valuation, uint256 timestamp);
    event AssetValuationUpdated(uint256 indexed tokenId, uint256 oldValuation, uint256 newValuation, uint256 timestamp);
}
