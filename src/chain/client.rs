//! JSON-RPC chain access.
//!
//! Wraps an alloy HTTP provider behind the [`ChainClient`] trait so the
//! pipeline can be driven by a mock client in tests. All calls carry a
//! timeout and are retried with exponential backoff + jitter; node-imposed
//! `eth_getLogs` range limits are surfaced as [`ChainError::RangeTooLarge`]
//! so the backfill engine can shrink its window instead of failing.

use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::Filter,
};
use async_trait::async_trait;
use log::warn;
use rand::Rng;
use rustc_hash::FxHashMap;
use thiserror::Error;
use url::Url;

/// A raw, undecoded log as returned by `eth_getLogs`.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u32,
}

#[derive(Debug, Error)]
pub enum ChainError {
    /// The queried block range exceeds the node's log limit. Not a failure:
    /// the caller halves the window and retries the same range.
    #[error("block range too large for eth_getLogs")]
    RangeTooLarge,
    /// Timeout, connection drop, rate limit. Retried with backoff.
    #[error("transient rpc error: {0}")]
    Transient(String),
    /// The retry budget is exhausted; the pipeline reports itself unhealthy.
    #[error("rpc retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Chain access as the pipeline sees it.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Logs emitted by `address` matching any of `topics` (topic0) within
    /// `[from_block, to_block]`, inclusive on both ends.
    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainError>;

    /// Unix timestamps for the given block numbers.
    async fn block_timestamps(&self, numbers: &[u64]) -> Result<FxHashMap<u64, u64>, ChainError>;
}

/// Exponential backoff with jitter, bounded attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), jittered by up to 25%.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_cap = (exp.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_cap);
        exp + Duration::from_millis(jitter)
    }
}

/// [`ChainClient`] over a JSON-RPC HTTP endpoint.
pub struct RpcChainClient {
    provider: DynProvider,
    retry: RetryPolicy,
    timeout: Duration,
}

/// Error fragments nodes use to reject oversized `eth_getLogs` ranges.
/// There is no standard error code for this, so we match on message text.
const RANGE_LIMIT_MARKERS: &[&str] = &[
    "block range",
    "range too large",
    "too many results",
    "query returned more than",
    "response size exceed",
    "log limit",
];

fn is_range_limit_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    RANGE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, retry: RetryPolicy, timeout: Duration) -> anyhow::Result<Self> {
        let url: Url = rpc_url.parse()?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            retry,
            timeout,
        })
    }

    async fn retrying<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChainError>>,
    {
        let mut last = String::new();

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                warn!(
                    "{op}: transient failure ({last}), retry {attempt}/{} in {delay:?}",
                    self.retry.max_attempts - 1
                );
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                // RangeTooLarge is a signal, not a fault; never retried here.
                Ok(Err(ChainError::RangeTooLarge)) => return Err(ChainError::RangeTooLarge),
                Ok(Err(e)) => last = e.to_string(),
                Err(_) => last = format!("timeout after {:?}", self.timeout),
            }
        }

        Err(ChainError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            last,
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_height(&self) -> Result<u64, ChainError> {
        self.retrying("eth_blockNumber", || async {
            self.provider
                .get_block_number()
                .await
                .map_err(|e| ChainError::Transient(e.to_string()))
        })
        .await
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainError> {
        let filter = Filter::new()
            .address(address)
            .event_signature(topics.to_vec())
            .from_block(from_block)
            .to_block(to_block);

        self.retrying("eth_getLogs", || {
            let filter = filter.clone();
            async move {
                let logs = self.provider.get_logs(&filter).await.map_err(|e| {
                    let msg = e.to_string();
                    if is_range_limit_error(&msg) {
                        ChainError::RangeTooLarge
                    } else {
                        ChainError::Transient(msg)
                    }
                })?;

                let raw = logs
                    .into_iter()
                    .filter_map(|log| {
                        // Pending logs carry no block/tx identity; they cannot
                        // be keyed for idempotent storage, so skip them.
                        let block_number = log.block_number?;
                        let tx_hash = log.transaction_hash?;
                        let log_index = log.log_index? as u32;
                        Some(RawLog {
                            address: log.address(),
                            topics: log.topics().to_vec(),
                            data: log.data().data.clone(),
                            block_number,
                            tx_hash,
                            log_index,
                        })
                    })
                    .collect();

                Ok(raw)
            }
        })
        .await
    }

    async fn block_timestamps(&self, numbers: &[u64]) -> Result<FxHashMap<u64, u64>, ChainError> {
        let mut timestamps = FxHashMap::default();

        for &number in numbers {
            if timestamps.contains_key(&number) {
                continue;
            }

            let header = self
                .retrying("eth_getBlockByNumber", || async move {
                    self.provider
                        .get_block_by_number(number.into())
                        .await
                        .map_err(|e| ChainError::Transient(e.to_string()))
                })
                .await?;

            if let Some(block) = header {
                timestamps.insert(number, block.header.timestamp);
            }
        }

        Ok(timestamps)
    }
}
