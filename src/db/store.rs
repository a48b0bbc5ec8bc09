//! Storage seams for the pipeline.
//!
//! The pipeline only ever talks to these traits, so tests (and dry runs)
//! can substitute the in-memory store for PostgreSQL.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Checkpoint, DomainEvent};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A checkpoint may never move backwards unless explicitly forced.
    /// This is fatal for the contract's pipeline: it indicates a logic bug
    /// or an unauthorized manual edit, and needs operator intervention.
    #[error(
        "checkpoint for {contract} cannot move backwards: {current} -> {requested} (use force to re-index)"
    )]
    NonMonotonicCheckpoint {
        contract: String,
        current: u64,
        requested: u64,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Idempotent event persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Upsert a batch of events keyed by `(tx_hash, log_index)`.
    ///
    /// Events already present are silent no-ops, which makes redelivery
    /// (retries, restarts, backfill/live overlap) safe. The whole batch is
    /// durable when this returns Ok; returns the number of rows actually
    /// inserted (duplicates excluded).
    async fn upsert_events(&self, events: &[DomainEvent]) -> Result<u64, StoreError>;
}

/// Durable per-contract watermark state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, contract: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Advance the watermark. Fails with `NonMonotonicCheckpoint` when
    /// `block` is lower than the stored value, unless `force` is set.
    async fn advance_checkpoint(
        &self,
        contract: &str,
        block: u64,
        force: bool,
    ) -> Result<(), StoreError>;
}
