//! Raw log decoding.
//!
//! Maps a raw log to a typed [`DomainEvent`] using the statically known
//! signature tables for the four contracts. Pure and in-memory; an
//! unrecognized or malformed log yields an error the pipeline logs and
//! skips, so one bad log never halts ingestion.

use alloy::{
    primitives::{LogData, B256},
    sol_types::SolEvent,
};
use thiserror::Error;

use crate::{
    abis::{dex, nft, oracle, token},
    chain::RawLog,
    config::ContractKind,
    db::models::{
        DomainEvent, LiquidityEvent, NftMintEvent, PriceUpdateEvent, SwapEvent, TransferEvent,
    },
    utils::hex_encode,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Topic0 is not in the monitored contract's signature table, e.g. a
    /// contract upgrade started emitting new events.
    #[error("unknown event signature {0} for {1:?} contract")]
    UnknownSignature(B256, ContractKind),
    /// Topic0 matched but the payload does not fit the declared layout.
    #[error("malformed {event} log: {source}")]
    Malformed {
        event: &'static str,
        source: alloy::sol_types::Error,
    },
    #[error("log has no topics")]
    MissingTopics,
}

fn malformed(event: &'static str) -> impl FnOnce(alloy::sol_types::Error) -> DecodeError {
    move |source| DecodeError::Malformed { event, source }
}

/// Decode one raw log from a contract of the given kind.
///
/// `block_timestamp` comes from the block header; the log itself does not
/// carry it.
pub fn decode(
    kind: ContractKind,
    log: &RawLog,
    block_timestamp: u64,
) -> Result<DomainEvent, DecodeError> {
    let topic0 = *log.topics.first().ok_or(DecodeError::MissingTopics)?;

    let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
    let contract_address = hex_encode(log.address.as_slice());
    let tx_hash = hex_encode(log.tx_hash.as_slice());
    let block_number = log.block_number;
    let log_index = log.log_index;

    match kind {
        ContractKind::Dex => match topic0 {
            t if t == dex::TokensPurchased::SIGNATURE_HASH => {
                let event = dex::TokensPurchased::decode_log_data(&data)
                    .map_err(malformed("TokensPurchased"))?;
                Ok(DomainEvent::Swap(SwapEvent::from_tokens_purchased(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == dex::TokensSold::SIGNATURE_HASH => {
                let event =
                    dex::TokensSold::decode_log_data(&data).map_err(malformed("TokensSold"))?;
                Ok(DomainEvent::Swap(SwapEvent::from_tokens_sold(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == dex::LiquidityAdded::SIGNATURE_HASH => {
                let event = dex::LiquidityAdded::decode_log_data(&data)
                    .map_err(malformed("LiquidityAdded"))?;
                Ok(DomainEvent::Liquidity(LiquidityEvent::from_liquidity_added(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == dex::LiquidityRemoved::SIGNATURE_HASH => {
                let event = dex::LiquidityRemoved::decode_log_data(&data)
                    .map_err(malformed("LiquidityRemoved"))?;
                Ok(DomainEvent::Liquidity(
                    LiquidityEvent::from_liquidity_removed(
                        event,
                        contract_address,
                        block_number,
                        tx_hash,
                        log_index,
                        block_timestamp,
                    ),
                ))
            },
            t => Err(DecodeError::UnknownSignature(t, kind)),
        },
        ContractKind::Token => match topic0 {
            t if t == token::Transfer::SIGNATURE_HASH => {
                let event =
                    token::Transfer::decode_log_data(&data).map_err(malformed("Transfer"))?;
                Ok(DomainEvent::Transfer(TransferEvent::from_erc20_transfer(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == token::TokensMinted::SIGNATURE_HASH => {
                let event = token::TokensMinted::decode_log_data(&data)
                    .map_err(malformed("TokensMinted"))?;
                Ok(DomainEvent::Transfer(TransferEvent::from_tokens_minted(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == token::TokensBurned::SIGNATURE_HASH => {
                let event = token::TokensBurned::decode_log_data(&data)
                    .map_err(malformed("TokensBurned"))?;
                Ok(DomainEvent::Transfer(TransferEvent::from_tokens_burned(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t => Err(DecodeError::UnknownSignature(t, kind)),
        },
        ContractKind::Nft => match topic0 {
            // ERC-721 Transfer has the same topic0 as ERC-20 Transfer; the
            // contract kind selects the all-indexed layout here.
            t if t == nft::Transfer::SIGNATURE_HASH => {
                let event =
                    nft::Transfer::decode_log_data(&data).map_err(malformed("Transfer(nft)"))?;
                Ok(DomainEvent::Transfer(TransferEvent::from_erc721_transfer(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == nft::AssetMinted::SIGNATURE_HASH => {
                let event =
                    nft::AssetMinted::decode_log_data(&data).map_err(malformed("AssetMinted"))?;
                Ok(DomainEvent::NftMint(NftMintEvent::from_asset_minted(
                    event,
                    contract_address,
                    block_number,
                    tx_hash,
                    log_index,
                    block_timestamp,
                )))
            },
            t if t == nft::AssetValuationUpdated::SIGNATURE_HASH => {
                let event = nft::AssetValuationUpdated::decode_log_data(&data)
                    .map_err(malformed("AssetValuationUpdated"))?;
                Ok(DomainEvent::PriceUpdate(
                    PriceUpdateEvent::from_asset_valuation_updated(
                        event,
                        contract_address,
                        block_number,
                        tx_hash,
                        log_index,
                        block_timestamp,
                    ),
                ))
            },
            t => Err(DecodeError::UnknownSignature(t, kind)),
        },
        ContractKind::Oracle => match topic0 {
            t if t == oracle::PriceUpdated::SIGNATURE_HASH => {
                let event = oracle::PriceUpdated::decode_log_data(&data)
                    .map_err(malformed("PriceUpdated"))?;
                Ok(DomainEvent::PriceUpdate(
                    PriceUpdateEvent::from_price_updated(
                        event,
                        contract_address,
                        block_number,
                        tx_hash,
                        log_index,
                        block_timestamp,
                    ),
                ))
            },
            t => Err(DecodeError::UnknownSignature(t, kind)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SwapDirection;
    use alloy::primitives::{Address, B256, U256};

    fn raw_log(address: Address, data: LogData, block: u64, log_index: u32) -> RawLog {
        RawLog {
            address,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number: block,
            tx_hash: B256::repeat_byte(0x11),
            log_index,
        }
    }

    #[test]
    fn decodes_tokens_purchased_into_buy_swap() {
        let buyer = Address::repeat_byte(0xAB);
        let event = dex::TokensPurchased {
            buyer,
            ethIn: U256::from(1_000_000_000_000_000u64),
            tokensOut: U256::from(5_000_000_000_000_000_000u64),
            timestamp: U256::from(1_700_000_000u64),
        };
        let log = raw_log(Address::repeat_byte(0x01), event.encode_log_data(), 100, 2);

        let decoded = decode(ContractKind::Dex, &log, 1_700_000_000).unwrap();
        match decoded {
            DomainEvent::Swap(swap) => {
                assert_eq!(swap.trader, hex_encode(buyer.as_slice()));
                assert_eq!(swap.direction, SwapDirection::Buy);
                assert_eq!(swap.eth_amount, U256::from(1_000_000_000_000_000u64));
                assert_eq!(swap.token_amount, U256::from(5_000_000_000_000_000_000u64));
                assert_eq!(swap.block_number, 100);
                assert_eq!(swap.log_index, 2);
                assert_eq!(swap.timestamp, 1_700_000_000);
            },
            other => panic!("expected swap, got {other:?}"),
        }
    }

    #[test]
    fn decodes_tokens_sold_into_sell_swap() {
        let event = dex::TokensSold {
            seller: Address::repeat_byte(0xCD),
            tokensIn: U256::from(42u64),
            ethOut: U256::from(7u64),
            timestamp: U256::from(1_700_000_100u64),
        };
        let log = raw_log(Address::repeat_byte(0x01), event.encode_log_data(), 101, 0);

        match decode(ContractKind::Dex, &log, 1_700_000_100).unwrap() {
            DomainEvent::Swap(swap) => {
                assert_eq!(swap.direction, SwapDirection::Sell);
                assert_eq!(swap.eth_amount, U256::from(7u64));
                assert_eq!(swap.token_amount, U256::from(42u64));
            },
            other => panic!("expected swap, got {other:?}"),
        }
    }

    #[test]
    fn erc20_and_erc721_transfers_disambiguate_by_contract_kind() {
        let erc20 = token::Transfer {
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x02),
            value: U256::from(1_000u64),
        };
        let log20 = raw_log(Address::repeat_byte(0x10), erc20.encode_log_data(), 5, 0);
        // Same topic0, different layouts.
        let erc721 = nft::Transfer {
            from: Address::ZERO,
            to: Address::repeat_byte(0x03),
            tokenId: U256::from(7u64),
        };
        let log721 = raw_log(Address::repeat_byte(0x20), erc721.encode_log_data(), 5, 1);
        assert_eq!(log20.topics[0], log721.topics[0]);

        match decode(ContractKind::Token, &log20, 0).unwrap() {
            DomainEvent::Transfer(t) => {
                assert_eq!(t.value, U256::from(1_000u64));
                assert!(!t.minted && !t.burned);
            },
            other => panic!("expected transfer, got {other:?}"),
        }

        match decode(ContractKind::Nft, &log721, 0).unwrap() {
            DomainEvent::Transfer(t) => {
                assert_eq!(t.value, U256::from(7u64));
                assert!(t.minted, "transfer from zero address is a mint");
            },
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn mint_and_burn_events_set_subtype_flags() {
        let minted = token::TokensMinted {
            to: Address::repeat_byte(0x04),
            amount: U256::from(10u64),
        };
        let log = raw_log(Address::repeat_byte(0x10), minted.encode_log_data(), 6, 0);
        match decode(ContractKind::Token, &log, 0).unwrap() {
            DomainEvent::Transfer(t) => {
                assert!(t.minted);
                assert_eq!(t.from, crate::utils::ZERO_ADDRESS);
            },
            other => panic!("expected transfer, got {other:?}"),
        }

        let burned = token::TokensBurned {
            from: Address::repeat_byte(0x05),
            amount: U256::from(3u64),
        };
        let log = raw_log(Address::repeat_byte(0x10), burned.encode_log_data(), 6, 1);
        match decode(ContractKind::Token, &log, 0).unwrap() {
            DomainEvent::Transfer(t) => {
                assert!(t.burned);
                assert_eq!(t.to, crate::utils::ZERO_ADDRESS);
            },
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn oracle_zero_token_id_maps_to_none() {
        let event = oracle::PriceUpdated {
            token: Address::repeat_byte(0x06),
            tokenId: U256::ZERO,
            oldPrice: U256::from(100u64),
            newPrice: U256::from(110u64),
            timestamp: U256::from(1_700_000_200u64),
        };
        let log = raw_log(Address::repeat_byte(0x30), event.encode_log_data(), 7, 0);
        match decode(ContractKind::Oracle, &log, 0).unwrap() {
            DomainEvent::PriceUpdate(p) => assert!(p.token_id.is_none()),
            other => panic!("expected price update, got {other:?}"),
        }
    }

    #[test]
    fn asset_valuation_update_is_nft_scoped_price() {
        let event = nft::AssetValuationUpdated {
            tokenId: U256::from(9u64),
            oldValuation: U256::from(500u64),
            newValuation: U256::from(700u64),
            timestamp: U256::from(1_700_000_300u64),
        };
        let nft_contract = Address::repeat_byte(0x20);
        let log = raw_log(nft_contract, event.encode_log_data(), 8, 0);
        match decode(ContractKind::Nft, &log, 0).unwrap() {
            DomainEvent::PriceUpdate(p) => {
                assert_eq!(p.token_id, Some(U256::from(9u64)));
                assert_eq!(p.token_address, hex_encode(nft_contract.as_slice()));
                assert_eq!(p.old_price, U256::from(500u64));
                assert_eq!(p.new_price, U256::from(700u64));
            },
            other => panic!("expected price update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_signature_is_reported_not_panicked() {
        let log = RawLog {
            address: Address::repeat_byte(0x01),
            topics: vec![B256::repeat_byte(0xEE)],
            data: Default::default(),
            block_number: 9,
            tx_hash: B256::repeat_byte(0x11),
            log_index: 0,
        };
        let err = decode(ContractKind::Dex, &log, 0).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSignature(_, _)));
    }
}
