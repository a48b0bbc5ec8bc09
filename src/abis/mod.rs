//! Static event signature tables for the four monitored contracts.
//!
//! The indexer only ever consumes these ABI fragments; there is no support
//! for dynamic contract ABIs.

pub mod dex;
pub mod nft;
pub mod oracle;
pub mod token;

use alloy::{primitives::B256, sol_types::SolEvent};
use once_cell::sync::Lazy;

use crate::config::ContractKind;

/// Topic0 hashes the DEX contract can emit.
pub static DEX_TOPICS: Lazy<Vec<B256>> = Lazy::new(|| {
    vec![
        dex::TokensPurchased::SIGNATURE_HASH,
        dex::TokensSold::SIGNATURE_HASH,
        dex::LiquidityAdded::SIGNATURE_HASH,
        dex::LiquidityRemoved::SIGNATURE_HASH,
    ]
});

/// Topic0 hashes the fungible token contract can emit.
pub static TOKEN_TOPICS: Lazy<Vec<B256>> = Lazy::new(|| {
    vec![
        token::Transfer::SIGNATURE_HASH,
        token::TokensMinted::SIGNATURE_HASH,
        token::TokensBurned::SIGNATURE_HASH,
    ]
});

/// Topic0 hashes the NFT contract can emit.
///
/// Note: the ERC-721 `Transfer` shares its signature hash with the ERC-20
/// one (indexed-ness does not change the hash), so the decoder relies on the
/// contract kind and topic count to pick the right layout.
pub static NFT_TOPICS: Lazy<Vec<B256>> = Lazy::new(|| {
    vec![
        nft::Transfer::SIGNATURE_HASH,
        nft::AssetMinted::SIGNATURE_HASH,
        nft::AssetValuationUpdated::SIGNATURE_HASH,
    ]
});

/// Topic0 hashes the price oracle contract can emit.
pub static ORACLE_TOPICS: Lazy<Vec<B256>> =
    Lazy::new(|| vec![oracle::PriceUpdated::SIGNATURE_HASH]);

/// The topic0 filter set for a given contract kind.
pub fn topics_for(kind: ContractKind) -> &'static [B256] {
    match kind {
        ContractKind::Dex => &DEX_TOPICS,
        ContractKind::Token => &TOKEN_TOPICS,
        ContractKind::Nft => &NFT_TOPICS,
        ContractKind::Oracle => &ORACLE_TOPICS,
    }
}
