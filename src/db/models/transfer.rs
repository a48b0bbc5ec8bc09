use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::{
    abis::{nft, token},
    utils::hex_encode,
};

/// A token movement, stored in `transfers`.
///
/// Covers the fungible `Transfer`/`TokensMinted`/`TokensBurned` events and
/// NFT ownership transfers (for those, `value` carries the token id per the
/// shared ERC-721 `Transfer` layout; the contract address distinguishes the
/// two for consumers).
#[derive(Debug, Clone, Serialize)]
pub struct TransferEvent {
    pub contract_address: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub from: String,
    pub to: String,
    pub value: U256,
    /// Transfer originates at the zero address, or came from an explicit
    /// `TokensMinted` event.
    pub minted: bool,
    /// Transfer terminates at the zero address, or came from an explicit
    /// `TokensBurned` event.
    pub burned: bool,
}

impl TransferEvent {
    pub fn from_erc20_transfer(
        event: token::Transfer,
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
            from: hex_encode(event.from.as_slice()),
            to: hex_encode(event.to.as_slice()),
            value: event.value,
            minted: event.from == Address::ZERO,
            burned: event.to == Address::ZERO,
        }
    }

    pub fn from_tokens_minted(
        event: token::TokensMinted,
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
            from: hex_encode(Address::ZERO.as_slice()),
            to: hex_encode(event.to.as_slice()),
            value: event.amount,
            minted: true,
            burned: false,
        }
    }

    pub fn from_tokens_burned(
        event: token::TokensBurned,
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
            from: hex_encode(event.from.as_slice()),
            to: hex_encode(Address::ZERO.as_slice()),
            value: event.amount,
            minted: false,
            burned: true,
        }
    }

    pub fn from_erc721_transfer(
        event: nft::Transfer,
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
            from: hex_encode(event.from.as_slice()),
            to: hex_encode(event.to.as_slice()),
            value: event.tokenId,
            minted: event.from == Address::ZERO,
            burned: event.to == Address::ZERO,
        }
    }
}
