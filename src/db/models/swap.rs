use alloy::primitives::U256;
use serde::Serialize;

use crate::{abis::dex, utils::hex_encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    Buy,
    Sell,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::Buy => "buy",
            SwapDirection::Sell => "sell",
        }
    }
}

/// A DEX trade (`TokensPurchased` / `TokensSold`), stored in `swaps`.
///
/// Amounts are wei-scale and kept as U256 end to end; human-scaled decimal
/// rendering happens in the query API, never here.
#[derive(Debug, Clone, Serialize)]
pub struct SwapEvent {
    pub contract_address: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub trader: String,
    pub direction: SwapDirection,
    pub eth_amount: U256,
    pub token_amount: U256,
    /// Timestamp the contract stamped into the event payload.
    pub timestamp: u64,
}

impl SwapEvent {
    pub fn from_tokens_purchased(
        event: dex::TokensPurchased,
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
            trader: hex_encode(event.buyer.as_slice()),
            direction: SwapDirection::Buy,
            eth_amount: event.ethIn,
            token_amount: event.tokensOut,
            timestamp: event.timestamp.to::<u64>(),
        }
    }

    pub fn from_tokens_sold(
        event: dex::TokensSold,
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
            trader: hex_encode(event.seller.as_slice()),
            direction: SwapDirection::Sell,
            eth_amount: event.ethOut,
            token_amount: event.tokensIn,
            timestamp: event.timestamp.to::<u64>(),
        }
    }
}
