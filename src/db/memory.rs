//! In-memory store, used by the pipeline tests and available for dry runs.
//!
//! Mirrors the PostgreSQL semantics that matter to the pipeline: upserts
//! deduplicate on `(tx_hash, log_index)` and checkpoint advances are
//! monotonic unless forced. Insertion order is preserved per collection so
//! ordering guarantees can be asserted.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::db::models::{Checkpoint, DomainEvent};
use crate::db::store::{CheckpointStore, EventStore, StoreError};

#[derive(Default)]
struct MemoryInner {
    /// Idempotency keys already stored, across all collections.
    seen: HashSet<(String, u32)>,
    /// Events per collection, in insertion order.
    collections: FxHashMap<&'static str, Vec<DomainEvent>>,
    checkpoints: FxHashMap<String, Checkpoint>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_len(&self, collection: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn collection(&self, collection: &str) -> Vec<DomainEvent> {
        let inner = self.inner.lock().unwrap();
        inner.collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn checkpoint_block(&self, contract: &str) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .checkpoints
            .get(contract)
            .map(|c| c.last_processed_block)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn upsert_events(&self, events: &[DomainEvent]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = 0u64;

        for event in events {
            let key = (event.tx_hash().to_string(), event.log_index());
            if !inner.seen.insert(key) {
                continue;
            }
            inner
                .collections
                .entry(event.collection())
                .or_default()
                .push(event.clone());
            inserted += 1;
        }

        Ok(inserted)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self, contract: &str) -> Result<Option<Checkpoint>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.checkpoints.get(contract).cloned())
    }

    async fn advance_checkpoint(
        &self,
        contract: &str,
        block: u64,
        force: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(current) = inner.checkpoints.get(contract) {
            if current.last_processed_block > block && !force {
                return Err(StoreError::NonMonotonicCheckpoint {
                    contract: contract.to_string(),
                    current: current.last_processed_block,
                    requested: block,
                });
            }
        }

        inner
            .checkpoints
            .insert(contract.to_string(), Checkpoint::new(contract, block));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{SwapDirection, SwapEvent};
    use alloy::primitives::U256;

    fn swap(tx_hash: &str, log_index: u32, block: u64) -> DomainEvent {
        DomainEvent::Swap(SwapEvent {
            contract_address: "0xdex".to_string(),
            tx_hash: tx_hash.to_string(),
            log_index,
            block_number: block,
            block_timestamp: 1_700_000_000,
            trader: "0xabc".to_string(),
            direction: SwapDirection::Buy,
            eth_amount: U256::from(1u64),
            token_amount: U256::from(5u64),
            timestamp: 1_700_000_000,
        })
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![swap("0x01", 0, 10), swap("0x01", 1, 10)];

        let first = store.upsert_events(&batch).await.unwrap();
        assert_eq!(first, 2);

        for _ in 0..5 {
            let again = store.upsert_events(&batch).await.unwrap();
            assert_eq!(again, 0);
        }

        assert_eq!(store.collection_len("swaps"), 2);
    }

    #[tokio::test]
    async fn checkpoint_advances_monotonically() {
        let store = MemoryStore::new();
        store.advance_checkpoint("dex", 100, false).await.unwrap();
        store.advance_checkpoint("dex", 250, false).await.unwrap();

        let err = store
            .advance_checkpoint("dex", 200, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NonMonotonicCheckpoint {
                current: 250,
                requested: 200,
                ..
            }
        ));
        assert_eq!(store.checkpoint_block("dex"), Some(250));

        // Forced rewind is the operator escape hatch for re-indexing.
        store.advance_checkpoint("dex", 200, true).await.unwrap();
        assert_eq!(store.checkpoint_block("dex"), Some(200));
    }

    #[tokio::test]
    async fn advancing_to_same_block_is_allowed() {
        let store = MemoryStore::new();
        store.advance_checkpoint("oracle", 5, false).await.unwrap();
        store.advance_checkpoint("oracle", 5, false).await.unwrap();
        assert_eq!(store.checkpoint_block("oracle"), Some(5));
    }
}
