use std::sync::Arc;

use crate::config::Settings;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PostgresClient;
pub use store::{CheckpointStore, EventStore, StoreError};

/// Database handle shared by the contract pipelines.
///
/// PostgreSQL holds both the five event collections and the per-contract
/// sync checkpoints; checkpoint advances only happen after the collection
/// writes for the same window have committed.
#[derive(Clone)]
pub struct Database {
    pub postgres: Arc<PostgresClient>,
}

impl Database {
    pub async fn new(settings: Arc<Settings>) -> anyhow::Result<Self> {
        let postgres = PostgresClient::new(settings.postgres.clone()).await?;

        // Run migrations
        postgres.migrate().await?;

        Ok(Self {
            postgres: Arc::new(postgres),
        })
    }
}
