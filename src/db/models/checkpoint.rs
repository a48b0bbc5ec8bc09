use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indexer sync progress checkpoint.
///
/// Tracks the last block fully processed for one monitored contract.
/// Read once at startup to seed the backfill engine, advanced only after the
/// whole window it covers has been durably persisted. Never moves backwards
/// except by forced operator intervention (e.g. re-indexing after a reorg).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub contract_name: String,
    pub last_processed_block: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(contract_name: impl Into<String>, last_processed_block: u64) -> Self {
        Self {
            contract_name: contract_name.into(),
            last_processed_block,
            updated_at: Utc::now(),
        }
    }
}
