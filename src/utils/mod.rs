//! Shared helpers for the sigil indexer.

use alloy::primitives::hex;

/// The Ethereum zero address (0x0000000000000000000000000000000000000000).
/// Transfers from/to it are mints/burns.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
