mod backfill;
mod health;
mod live;
mod manager;
mod parser;
mod pipeline;

pub use backfill::run_backfill;
pub use health::{HealthRegistry, PipelinePhase, PipelineStatus};
pub use live::{plan_poll, run_live, PollPlan};
pub use manager::ContractManager;
pub use parser::{decode, DecodeError};
pub use pipeline::ContractPipeline;

#[cfg(test)]
pub(crate) mod testkit {
    //! Deterministic chain stub for pipeline tests.

    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use alloy::{
        primitives::{Address, B256},
        sol_types::SolEvent,
    };
    use async_trait::async_trait;
    use rustc_hash::FxHashMap;

    use crate::chain::{ChainClient, ChainError, RawLog};

    pub(crate) struct MockChain {
        head: AtomicU64,
        logs: Vec<RawLog>,
        /// Largest span `get_logs` accepts before answering `RangeTooLarge`,
        /// mimicking a node-side log limit.
        max_span: Option<u64>,
        /// Every `(from, to)` range `get_logs` was asked for.
        pub calls: Mutex<Vec<(u64, u64)>>,
    }

    impl MockChain {
        pub fn new(head: u64, logs: Vec<RawLog>) -> Self {
            Self {
                head: AtomicU64::new(head),
                logs,
                max_span: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_max_span(mut self, max_span: u64) -> Self {
            self.max_span = Some(max_span);
            self
        }

        pub fn set_head(&self, head: u64) {
            self.head.store(head, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn current_height(&self) -> Result<u64, ChainError> {
            Ok(self.head.load(Ordering::SeqCst))
        }

        async fn get_logs(
            &self,
            address: Address,
            topics: &[B256],
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<RawLog>, ChainError> {
            self.calls.lock().unwrap().push((from_block, to_block));

            if let Some(max_span) = self.max_span {
                if to_block - from_block + 1 > max_span {
                    return Err(ChainError::RangeTooLarge);
                }
            }

            Ok(self
                .logs
                .iter()
                .filter(|l| {
                    l.address == address
                        && l.block_number >= from_block
                        && l.block_number <= to_block
                        && l.topics.first().is_some_and(|t| topics.contains(t))
                })
                .cloned()
                .collect())
        }

        async fn block_timestamps(
            &self,
            numbers: &[u64],
        ) -> Result<FxHashMap<u64, u64>, ChainError> {
            Ok(numbers.iter().map(|&n| (n, 1_700_000_000 + n)).collect())
        }
    }

    /// Build a raw log for a sol event, with a tx hash derived from `tx_tag`.
    pub(crate) fn raw_log<E: SolEvent>(
        event: &E,
        address: Address,
        block_number: u64,
        tx_tag: u8,
        log_index: u32,
    ) -> RawLog {
        let data = event.encode_log_data();
        RawLog {
            address,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number,
            tx_hash: B256::repeat_byte(tx_tag),
            log_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    use alloy::primitives::{Address, B256, U256};
    use tokio_util::sync::CancellationToken;

    use super::testkit::{raw_log, MockChain};
    use super::*;
    use crate::{
        abis::dex,
        chain::RawLog,
        config::{ContractKind, ContractSettings, IndexerSettings},
        db::{models::DomainEvent, CheckpointStore, MemoryStore},
    };

    const DEX_ADDRESS: &str = "0x00000000000000000000000000000000000000d1";

    fn indexer_settings(window: u64, gap_threshold: u64) -> IndexerSettings {
        IndexerSettings {
            rpc_url: "http://localhost:8545".to_string(),
            backfill_window_blocks: window,
            live_poll_interval_secs: 1,
            gap_threshold_blocks: gap_threshold,
            rpc_timeout_secs: 5,
            retry_max_attempts: 3,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 100,
        }
    }

    fn dex_contract(start_block: u64) -> ContractSettings {
        ContractSettings {
            name: "dex".to_string(),
            kind: ContractKind::Dex,
            address: DEX_ADDRESS.to_string(),
            start_block,
        }
    }

    fn purchase(block: u64, tx_tag: u8, log_index: u32) -> RawLog {
        let event = dex::TokensPurchased {
            buyer: Address::repeat_byte(0xAB),
            ethIn: U256::from(1_000_000_000_000_000u64),
            tokensOut: U256::from(5_000_000_000_000_000_000u64),
            timestamp: U256::from(1_700_000_000u64),
        };
        raw_log(
            &event,
            Address::from_str(DEX_ADDRESS).unwrap(),
            block,
            tx_tag,
            log_index,
        )
    }

    fn pipeline(
        contract: ContractSettings,
        indexer: IndexerSettings,
        chain: Arc<MockChain>,
        store: Arc<MemoryStore>,
    ) -> ContractPipeline {
        ContractPipeline::new(
            &contract,
            &indexer,
            chain,
            store.clone(),
            store,
            HealthRegistry::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn backfill_covers_history_in_windows() {
        let logs = vec![
            purchase(10, 0x01, 0),
            purchase(1_500, 0x02, 3),
            purchase(2_100, 0x03, 0),
            purchase(4_999, 0x04, 7),
        ];
        let chain = Arc::new(MockChain::new(4_999, logs));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(0),
            indexer_settings(2_000, 50),
            chain.clone(),
            store.clone(),
        );

        let synced = run_backfill(&p, &CancellationToken::new()).await.unwrap();

        assert_eq!(synced, 4_999);
        assert_eq!(store.collection_len("swaps"), 4);
        assert_eq!(store.checkpoint_block("dex"), Some(4_999));

        let calls = chain.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(0, 1_999), (2_000, 3_999), (4_000, 4_999)]);
    }

    #[tokio::test]
    async fn range_limit_shrinks_window_without_losing_logs() {
        let logs: Vec<RawLog> = (0..10)
            .map(|i| purchase(i * 100, 0x10 + i as u8, 0))
            .collect();
        // Node rejects anything wider than 300 blocks.
        let chain = Arc::new(MockChain::new(999, logs).with_max_span(300));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(0),
            indexer_settings(2_000, 50),
            chain.clone(),
            store.clone(),
        );

        run_backfill(&p, &CancellationToken::new()).await.unwrap();

        assert_eq!(store.collection_len("swaps"), 10);
        assert_eq!(store.checkpoint_block("dex"), Some(999));

        // Coverage must be gapless: successful calls stitch together into
        // exactly [0, 999].
        let calls = chain.calls.lock().unwrap().clone();
        let mut next_expected = 0u64;
        for (from, to) in calls {
            if to - from + 1 > 300 {
                continue; // rejected with RangeTooLarge
            }
            assert_eq!(from, next_expected, "gap or overlap at block {from}");
            next_expected = to + 1;
        }
        assert_eq!(next_expected, 1_000);
    }

    #[tokio::test]
    async fn restart_replays_nothing_new() {
        let logs = vec![purchase(100, 0x01, 2), purchase(850, 0x02, 0)];
        let chain = Arc::new(MockChain::new(900, logs));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(0),
            indexer_settings(500, 50),
            chain.clone(),
            store.clone(),
        );

        run_backfill(&p, &CancellationToken::new()).await.unwrap();
        assert_eq!(store.collection_len("swaps"), 2);

        // Restart with the same durable state.
        let p2 = pipeline(
            dex_contract(0),
            indexer_settings(500, 50),
            chain.clone(),
            store.clone(),
        );
        let synced = run_backfill(&p2, &CancellationToken::new()).await.unwrap();

        assert_eq!(synced, 900);
        assert_eq!(store.collection_len("swaps"), 2);
        assert_eq!(store.checkpoint_block("dex"), Some(900));
    }

    #[tokio::test]
    async fn redelivered_window_keeps_exactly_one_record() {
        let chain = Arc::new(MockChain::new(150, vec![purchase(100, 0x01, 2)]));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(0),
            indexer_settings(2_000, 50),
            chain,
            store.clone(),
        );

        p.process_range(0, 150).await.unwrap();
        // Same window again, e.g. a crash after commit but before the
        // checkpoint write.
        p.process_range(0, 150).await.unwrap();

        let swaps = store.collection("swaps");
        assert_eq!(swaps.len(), 1);
        match &swaps[0] {
            DomainEvent::Swap(s) => {
                assert_eq!(s.block_number, 100);
                assert_eq!(s.log_index, 2);
                assert_eq!(s.eth_amount, U256::from(1_000_000_000_000_000u64));
                assert_eq!(s.token_amount, U256::from(5_000_000_000_000_000_000u64));
            },
            other => panic!("expected swap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_log_is_skipped_not_fatal() {
        let mut bogus = purchase(50, 0x05, 1);
        bogus.topics[0] = B256::repeat_byte(0xEE);
        // MockChain filters on known topics, so inject via a pipeline call
        // path that sees the log: decode_batch directly.
        let chain = Arc::new(MockChain::new(100, vec![]));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(0),
            indexer_settings(2_000, 50),
            chain,
            store.clone(),
        );

        let batch = vec![bogus, purchase(60, 0x06, 0)];
        let events = p.decode_batch(&batch).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].block_number(), 60);
    }

    #[tokio::test]
    async fn events_are_ordered_by_block_then_log_index() {
        let logs = vec![
            purchase(200, 0x03, 5),
            purchase(100, 0x01, 7),
            purchase(100, 0x02, 1),
        ];
        let chain = Arc::new(MockChain::new(300, vec![]));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(dex_contract(0), indexer_settings(2_000, 50), chain, store);

        let events = p.decode_batch(&logs).await.unwrap();
        let keys: Vec<_> = events.iter().map(DomainEvent::ordering_key).collect();
        assert_eq!(keys, vec![(100, 1), (100, 7), (200, 5)]);
    }

    #[tokio::test]
    async fn start_block_bounds_the_first_window() {
        let logs = vec![purchase(10, 0x01, 0), purchase(600, 0x02, 0)];
        let chain = Arc::new(MockChain::new(700, logs));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(
            dex_contract(500),
            indexer_settings(1_000, 50),
            chain.clone(),
            store.clone(),
        );

        run_backfill(&p, &CancellationToken::new()).await.unwrap();

        // The pre-deployment log at block 10 is never even requested.
        let calls = chain.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(500, 700)]);
        assert_eq!(store.collection_len("swaps"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_poll_ingests_new_blocks() {
        let chain = Arc::new(MockChain::new(100, vec![purchase(101, 0x09, 0)]));
        let store = Arc::new(MemoryStore::new());
        store.advance_checkpoint("dex", 100, false).await.unwrap();

        let p = Arc::new(pipeline(
            dex_contract(0),
            indexer_settings(2_000, 50),
            chain.clone(),
            store.clone(),
        ));

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_pipeline = p.clone();
        let handle =
            tokio::spawn(async move { run_live(&task_pipeline, &task_cancel).await });

        // First tick sees head 100 (idle), then the chain advances.
        tokio::time::sleep(Duration::from_secs(2)).await;
        chain.set_head(101);
        tokio::time::sleep(Duration::from_secs(5)).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.collection_len("swaps"), 1);
        assert_eq!(store.checkpoint_block("dex"), Some(101));
    }

    #[tokio::test(start_paused = true)]
    async fn live_hands_large_gap_back_to_backfill() {
        let logs = vec![purchase(150, 0x0A, 0), purchase(900, 0x0B, 0)];
        let chain = Arc::new(MockChain::new(100, logs));
        let store = Arc::new(MemoryStore::new());
        store.advance_checkpoint("dex", 100, false).await.unwrap();

        let p = Arc::new(pipeline(
            dex_contract(0),
            indexer_settings(400, 50),
            chain.clone(),
            store.clone(),
        ));

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_pipeline = p.clone();
        let handle =
            tokio::spawn(async move { run_live(&task_pipeline, &task_cancel).await });

        // Head jumps far past the gap threshold; the subscriber should walk
        // the gap in backfill windows rather than one giant query.
        chain.set_head(900);
        tokio::time::sleep(Duration::from_secs(5)).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.collection_len("swaps"), 2);
        assert_eq!(store.checkpoint_block("dex"), Some(900));

        let calls = chain.calls.lock().unwrap().clone();
        assert!(
            calls.iter().all(|(from, to)| to - from + 1 <= 400),
            "gap was not windowed: {calls:?}"
        );
    }
}
