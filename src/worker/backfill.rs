//! Historical catch-up.
//!
//! Walks fixed-size windows from the contract's resume point up to the chain
//! head observed when the backfill starts. Each window is fetched, decoded,
//! persisted, and checkpointed before the next begins, so a crash resumes at
//! the last completed window with no gaps and no double-stored events.

use log::info;
use tokio_util::sync::CancellationToken;

use crate::worker::pipeline::ContractPipeline;

/// Backfill from the resume point to the current head. Returns the highest
/// block processed (the head at call time, unless cancelled early).
///
/// Blocks mined while the backfill runs are left to the live subscriber;
/// its gap handling pulls them in right after.
pub async fn run_backfill(
    pipeline: &ContractPipeline,
    cancel: &CancellationToken,
) -> anyhow::Result<u64> {
    let head = pipeline.chain.current_height().await?;
    let mut cursor = pipeline.resume_block().await?;

    if cursor > head {
        info!(
            "{}: checkpoint {} already at or past head {head}, nothing to backfill",
            pipeline.name,
            cursor.saturating_sub(1)
        );
        return Ok(cursor.saturating_sub(1));
    }

    info!(
        "{}: backfilling blocks [{cursor}, {head}] in windows of {}",
        pipeline.name, pipeline.window
    );

    let mut last_processed = cursor.saturating_sub(1);

    while cursor <= head {
        if cancel.is_cancelled() {
            info!("{}: backfill cancelled at block {last_processed}", pipeline.name);
            break;
        }

        let to = (cursor + pipeline.window - 1).min(head);
        pipeline.process_range(cursor, to).await?;

        last_processed = to;
        cursor = to + 1;
    }

    Ok(last_processed)
}
