//! Live head-following.
//!
//! Polls the chain head on a fixed interval and ingests whatever landed
//! since the watermark. If the subscriber falls far enough behind (slow
//! store, long RPC outage), it hands the gap back to the windowed backfill
//! path instead of issuing one oversized log query.

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::worker::{
    backfill::run_backfill,
    health::PipelinePhase,
    pipeline::ContractPipeline,
};

/// What a single poll tick should do, given the watermark and the head.
#[derive(Debug, PartialEq, Eq)]
pub enum PollPlan {
    /// No new blocks. Head regressions (reorg or lagging node) land here
    /// too: the watermark never moves backwards.
    Idle,
    /// Ingest `[from, to]` directly.
    Ingest { from: u64, to: u64 },
    /// Too far behind; re-enter windowed backfill.
    Backfill,
}

pub fn plan_poll(last_processed: u64, head: u64, gap_threshold: u64) -> PollPlan {
    if head <= last_processed {
        return PollPlan::Idle;
    }

    let gap = head - last_processed;
    if gap > gap_threshold {
        PollPlan::Backfill
    } else {
        PollPlan::Ingest {
            from: last_processed + 1,
            to: head,
        }
    }
}

/// Poll until cancelled.
pub async fn run_live(pipeline: &ContractPipeline, cancel: &CancellationToken) -> anyhow::Result<()> {
    let mut last_processed = pipeline.resume_block().await?.saturating_sub(1);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("{}: live subscriber stopped at block {last_processed}", pipeline.name);
                return Ok(());
            }
            _ = tokio::time::sleep(pipeline.poll_interval) => {}
        }

        let head = match pipeline.chain.current_height().await {
            Ok(head) => head,
            Err(e) => {
                // Stay in the loop: the node may come back, and the retry
                // budget inside the client already absorbed short blips.
                warn!("{}: failed to fetch chain head: {e}", pipeline.name);
                pipeline.health.set_phase(&pipeline.name, PipelinePhase::Degraded);
                continue;
            },
        };

        match plan_poll(last_processed, head, pipeline.gap_threshold) {
            PollPlan::Idle => {},
            PollPlan::Ingest { from, to } => {
                pipeline.process_range(from, to).await?;
                last_processed = to;
                pipeline.health.set_phase(&pipeline.name, PipelinePhase::Live);
            },
            PollPlan::Backfill => {
                info!(
                    "{}: {} blocks behind head {head}, re-entering windowed backfill",
                    pipeline.name,
                    head - last_processed
                );
                pipeline.health.set_phase(&pipeline.name, PipelinePhase::Backfilling);
                last_processed = run_backfill(pipeline, cancel).await?;
                pipeline.health.set_phase(&pipeline.name, PipelinePhase::Live);
            },
        }
    }
}
