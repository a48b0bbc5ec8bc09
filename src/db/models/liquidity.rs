use alloy::primitives::U256;
use serde::Serialize;

use crate::{abis::dex, utils::hex_encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityKind {
    Added,
    Removed,
}

impl LiquidityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidityKind::Added => "added",
            LiquidityKind::Removed => "removed",
        }
    }
}

/// A DEX liquidity change (`LiquidityAdded` / `LiquidityRemoved`), stored in
/// `liquidity`.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidityEvent {
    pub contract_address: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub provider: String,
    pub kind: LiquidityKind,
    pub token_amount: U256,
    pub eth_amount: U256,
    pub liquidity_tokens: U256,
}

impl LiquidityEvent {
    pub fn from_liquidity_added(
        event: dex::LiquidityAdded,
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
            provider: hex_encode(event.provider.as_slice()),
            kind: LiquidityKind::Added,
            token_amount: event.tokenAmount,
            eth_amount: event.ethAmount,
            liquidity_tokens: event.liquidityTokens,
        }
    }

    pub fn from_liquidity_removed(
        event: dex::LiquidityRemoved,
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
            provider: hex_encode(event.provider.as_slice()),
            kind: LiquidityKind::Removed,
            token_amount: event.tokenAmount,
            eth_amount: event.ethAmount,
            liquidity_tokens: event.liquidityTokens,
        }
    }
}
