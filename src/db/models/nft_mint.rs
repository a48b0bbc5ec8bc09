use alloy::primitives::U256;
use serde::Serialize;

use crate::{abis::nft, utils::hex_encode};

/// An NFT asset creation (`AssetMinted`), stored in `nft_mints`.
#[derive(Debug, Clone, Serialize)]
pub struct NftMintEvent {
    pub contract_address: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub token_id: U256,
    pub owner: String,
    pub name: String,
    pub valuation: U256,
    pub timestamp: u64,
}

impl NftMintEvent {
    pub fn from_asset_minted(
        event: nft::AssetMinted,
        contract_address: String,
        block_number: u64,
        tx_hash: String,
        log_index: u32,
        block_timestamp: u64,
    ) -> Self {
        Self {
            contract_address,
            tx_hash,
            log_index,
            block_number,
            block_timestamp,
            token_id: event.tokenId,
            owner: hex_encode(event.owner.as_slice()),
            name: event.name,
            valuation: event.valuation,
            timestamp: event.timestamp.to::<u64>(),
        }
    }
}
