use alloy::primitives::U256;
use serde::Serialize;

use crate::{
    abis::{nft, oracle},
    utils::hex_encode,
};

/// A price change, stored in `prices`.
///
/// Produced by the oracle's `PriceUpdated` and by the NFT contract's
/// `AssetValuationUpdated` (which is a price update scoped to one token id).
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdateEvent {
    pub contract_address: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub token_address: String,
    /// Present only for NFT-scoped prices.
    pub token_id: Option<U256>,
    pub old_price: U256,
    pub new_price: U256,
    pub timestamp: u64,
}

impl PriceUpdateEvent {
    pub fn from_price_updated(
        event: oracle::PriceUpdated,
        contract_address: String,
        block_number: u64,
        tx_hash: String,
        log_index: u32,
        block_timestamp: u64,
    ) -> Self {
        // The oracle emits tokenId=0 for fungible (non-NFT-scoped) prices.
        let token_id = if event.tokenId.is_zero() {
            None
        } else {
            Some(event.tokenId)
        };

        Self {
            contract_address,
            tx_hash,
            log_index,
            block_number,
            block_timestamp,
            token_address: hex_encode(event.token.as_slice()),
            token_id,
            old_price: event.oldPrice,
            new_price: event.newPrice,
            timestamp: event.timestamp.to::<u64>(),
        }
    }

    pub fn from_asset_valuation_updated(
        event: nft::AssetValuationUpdated,
        contract_address: String,
        block_number: u64,
        tx_hash: String,
        log_index: u32,
        block_timestamp: u64,
    ) -> Self {
        Self {
            contract_address: contract_address.clone(),
            tx_hash,
            log_index,
            block_number,
            block_timestamp,
            token_address: contract_address,
            token_id: Some(event.tokenId),
            old_price: event.oldValuation,
            new_price: event.newValuation,
            timestamp: event.timestamp.to::<u64>(),
        }
    }
}
