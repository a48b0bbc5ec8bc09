use serde::Serialize;

use crate::db::models::{
    LiquidityEvent, NftMintEvent, PriceUpdateEvent, SwapEvent, TransferEvent,
};

/// A decoded on-chain event, one variant per stored collection.
///
/// Every variant carries the same identity fields; `(tx_hash, log_index)`
/// uniquely identifies one log occurrence across the whole chain history and
/// is the idempotency key for persistence.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Swap(SwapEvent),
    Liquidity(LiquidityEvent),
    Transfer(TransferEvent),
    NftMint(NftMintEvent),
    PriceUpdate(PriceUpdateEvent),
}

impl DomainEvent {
    pub fn tx_hash(&self) -> &str {
        match self {
            DomainEvent::Swap(e) => &e.tx_hash,
            DomainEvent::Liquidity(e) => &e.tx_hash,
            DomainEvent::Transfer(e) => &e.tx_hash,
            DomainEvent::NftMint(e) => &e.tx_hash,
            DomainEvent::PriceUpdate(e) => &e.tx_hash,
        }
    }

    pub fn log_index(&self) -> u32 {
        match self {
            DomainEvent::Swap(e) => e.log_index,
            DomainEvent::Liquidity(e) => e.log_index,
            DomainEvent::Transfer(e) => e.log_index,
            DomainEvent::NftMint(e) => e.log_index,
            DomainEvent::PriceUpdate(e) => e.log_index,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            DomainEvent::Swap(e) => e.block_number,
            DomainEvent::Liquidity(e) => e.block_number,
            DomainEvent::Transfer(e) => e.block_number,
            DomainEvent::NftMint(e) => e.block_number,
            DomainEvent::PriceUpdate(e) => e.block_number,
        }
    }

    /// Name of the collection this event is stored in.
    pub fn collection(&self) -> &'static str {
        match self {
            DomainEvent::Swap(_) => "swaps",
            DomainEvent::Liquidity(_) => "liquidity",
            DomainEvent::Transfer(_) => "transfers",
            DomainEvent::NftMint(_) => "nft_mints",
            DomainEvent::PriceUpdate(_) => "prices",
        }
    }

    /// Sort key matching on-chain emission order.
    pub fn ordering_key(&self) -> (u64, u32) {
        (self.block_number(), self.log_index())
    }
}
