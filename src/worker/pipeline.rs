//! Per-contract ingestion pipeline.
//!
//! One pipeline owns one monitored contract end to end: fetch raw logs,
//! decode them, upsert the batch, advance the checkpoint. The same
//! `process_range` path serves both backfill windows and live polls, so the
//! exactly-once guarantees hold identically in both phases.

use std::{str::FromStr, sync::Arc, time::Duration};

use alloy::primitives::{Address, B256};
use anyhow::Context;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    abis,
    chain::{ChainClient, ChainError, RawLog},
    config::{ContractKind, ContractSettings, IndexerSettings},
    db::{models::DomainEvent, CheckpointStore, EventStore},
    worker::{
        backfill::run_backfill,
        health::{HealthRegistry, PipelinePhase},
        live::run_live,
        parser,
    },
};

pub struct ContractPipeline {
    pub(crate) name: String,
    pub(crate) kind: ContractKind,
    pub(crate) address: Address,
    pub(crate) topics: &'static [B256],
    pub(crate) start_block: u64,
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    pub(crate) health: HealthRegistry,
    pub(crate) window: u64,
    pub(crate) poll_interval: Duration,
    pub(crate) gap_threshold: u64,
}

impl ContractPipeline {
    pub fn new(
        contract: &ContractSettings,
        indexer: &IndexerSettings,
        chain: Arc<dyn ChainClient>,
        events: Arc<dyn EventStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        health: HealthRegistry,
    ) -> anyhow::Result<Self> {
        let address = Address::from_str(&contract.address)
            .with_context(|| format!("Invalid address for contract {}", contract.name))?;

        Ok(Self {
            name: contract.name.clone(),
            kind: contract.kind,
            address,
            topics: abis::topics_for(contract.kind),
            start_block: contract.start_block,
            chain,
            events,
            checkpoints,
            health,
            window: indexer.backfill_window_blocks.max(1),
            poll_interval: Duration::from_secs(indexer.live_poll_interval_secs),
            gap_threshold: indexer.gap_threshold_blocks,
        })
    }

    /// First block the pipeline should process next: one past the stored
    /// checkpoint, or the contract's deployment block on a fresh start.
    pub(crate) async fn resume_block(&self) -> anyhow::Result<u64> {
        let checkpoint = self.checkpoints.get_checkpoint(&self.name).await?;
        Ok(checkpoint
            .map(|c| c.last_processed_block + 1)
            .unwrap_or(self.start_block)
            .max(self.start_block))
    }

    /// Fetch logs for `[from, to]`, shrinking the request span whenever the
    /// node rejects it as too large. Coverage stays gapless: a shrunken span
    /// re-requests from the same cursor, never past it.
    pub(crate) async fn fetch_range(&self, from: u64, to: u64) -> Result<Vec<RawLog>, ChainError> {
        let mut logs = Vec::new();
        let mut cursor = from;
        let mut span = to - from + 1;

        while cursor <= to {
            let end = (cursor + span - 1).min(to);

            match self
                .chain
                .get_logs(self.address, self.topics, cursor, end)
                .await
            {
                Ok(mut batch) => {
                    logs.append(&mut batch);
                    cursor = end + 1;
                },
                Err(ChainError::RangeTooLarge) => {
                    if span == 1 {
                        // A single block exceeds the node's limit; nothing
                        // left to halve.
                        return Err(ChainError::Transient(format!(
                            "{}: node rejected single-block log query at {cursor}",
                            self.name
                        )));
                    }
                    span = (span / 2).max(1);
                    warn!(
                        "{}: log range [{cursor}, {end}] too large, shrinking span to {span}",
                        self.name
                    );
                },
                Err(e) => return Err(e),
            }
        }

        Ok(logs)
    }

    /// Decode a raw batch into domain events in emission order.
    ///
    /// Unknown or malformed logs are logged and skipped; one bad log must
    /// not stall the contract's watermark.
    pub(crate) async fn decode_batch(&self, raw: &[RawLog]) -> anyhow::Result<Vec<DomainEvent>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let mut block_numbers: Vec<u64> = raw.iter().map(|l| l.block_number).collect();
        block_numbers.sort_unstable();
        block_numbers.dedup();

        let timestamps = self.chain.block_timestamps(&block_numbers).await?;

        let mut events = Vec::with_capacity(raw.len());
        for log in raw {
            let block_timestamp = timestamps.get(&log.block_number).copied().unwrap_or(0);
            match parser::decode(self.kind, log, block_timestamp) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(
                        "{}: skipping log {}#{} at block {}: {e}",
                        self.name,
                        crate::utils::hex_encode(log.tx_hash.as_slice()),
                        log.log_index,
                        log.block_number
                    );
                },
            }
        }

        events.sort_by_key(DomainEvent::ordering_key);
        Ok(events)
    }

    /// Ingest one block range: fetch, decode, upsert, then advance the
    /// checkpoint. The checkpoint moves only after the batch is durable, so
    /// a crash in between replays the range and the upsert deduplicates.
    pub async fn process_range(&self, from: u64, to: u64) -> anyhow::Result<u64> {
        if from > to {
            return Ok(0);
        }

        let raw = self.fetch_range(from, to).await?;
        let events = self.decode_batch(&raw).await?;
        let inserted = self.events.upsert_events(&events).await?;

        self.checkpoints
            .advance_checkpoint(&self.name, to, false)
            .await?;
        self.health.record_progress(&self.name, to);

        debug!(
            "{}: processed blocks [{from}, {to}]: {} logs, {} new events",
            self.name,
            raw.len(),
            inserted
        );

        Ok(inserted)
    }

    /// Run the pipeline until cancelled: backfill to the head observed at
    /// startup, then poll live.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.health.set_phase(&self.name, PipelinePhase::Backfilling);

        let result = async {
            let synced_to = run_backfill(self, &cancel).await?;
            if cancel.is_cancelled() {
                return Ok(());
            }

            info!("{}: backfill complete at block {synced_to}, going live", self.name);
            self.health.set_phase(&self.name, PipelinePhase::Live);

            run_live(self, &cancel).await
        }
        .await;

        if let Err(ref e) = result {
            self.health.set_phase(&self.name, PipelinePhase::Degraded);
            warn!("{}: pipeline stopped with error: {e:#}", self.name);
        }

        result
    }
}
