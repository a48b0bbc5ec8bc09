use config::{Config, ConfigError, File};
use serde::Deserialize;

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - The five event collections (swaps, transfers, nft_mints, prices, liquidity)
/// - Per-contract sync checkpoints
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Chain client and pipeline tuning.
///
/// Trade-offs: larger backfill windows mean fewer RPC calls but a higher
/// chance of hitting the node's log-count limit (which the client surfaces
/// as `RangeTooLarge` and the backfill engine absorbs by halving the
/// window). Shorter live poll intervals lower latency but raise RPC load.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexerSettings {
    pub rpc_url: String,
    #[serde(default = "default_backfill_window_blocks")]
    pub backfill_window_blocks: u64,
    #[serde(default = "default_live_poll_interval_secs")]
    pub live_poll_interval_secs: u64,
    /// If the live subscriber falls more than this many blocks behind the
    /// head, it hands the gap back to the backfill engine.
    #[serde(default = "default_gap_threshold_blocks")]
    pub gap_threshold_blocks: u64,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_backfill_window_blocks() -> u64 {
    2_000
}

fn default_live_poll_interval_secs() -> u64 {
    5
}

fn default_gap_threshold_blocks() -> u64 {
    50
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

/// Which of the four statically known ABIs a monitored contract speaks.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Dex,
    Token,
    Nft,
    Oracle,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Dex => "dex",
            ContractKind::Token => "token",
            ContractKind::Nft => "nft",
            ContractKind::Oracle => "oracle",
        }
    }
}

/// One monitored contract: identity plus where its history starts.
#[derive(Debug, Deserialize, Clone)]
pub struct ContractSettings {
    /// Checkpoint key. Must be unique across the configured contracts.
    pub name: String,
    pub kind: ContractKind,
    pub address: String,
    /// Deployment block; indexing never looks earlier than this.
    #[serde(default)]
    pub start_block: u64,
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub postgres: PostgresSettings,
    pub indexer: IndexerSettings,
    pub contracts: Vec<ContractSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
